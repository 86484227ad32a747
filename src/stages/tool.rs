//! Stages that delegate to external programs.
//!
//! Two modes:
//! - [`ToolFilter`] runs the tool once per entry, contents on stdin, result on stdout.
//! - [`ToolBatch`] runs the tool once over the whole batch and reads back
//!   whatever it wrote to a scratch output directory.
//!
//! Tools run in the project root with `NODE_ENV` set from the production flag.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{Stage, StageContext};
use crate::batch::FileBatch;
use crate::glob::Glob;
use crate::toolchain::ToolCommand;
use crate::util::slash_path;

/// Keep error messages readable when a tool dumps a lot on stderr.
const MAX_STDERR_CHARS: usize = 4000;

fn stderr_excerpt(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let cleaned: String = text
        .chars()
        .filter(|&c| c == '\n' || c == '\t' || (c >= ' ' && c != '\u{FFFD}'))
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.chars().count() > MAX_STDERR_CHARS {
        let head: String = trimmed.chars().take(MAX_STDERR_CHARS).collect();
        format!("{}\n... [stderr truncated]", head)
    } else {
        trimmed.to_string()
    }
}

async fn run_tool(
    tool: &ToolCommand,
    args: Vec<String>,
    ctx: &StageContext,
    stdin: Option<Bytes>,
) -> anyhow::Result<Vec<u8>> {
    tracing::debug!(task = %ctx.task, "Running {} {}", tool.program, args.join(" "));

    let mut child = Command::new(&tool.program)
        .args(&args)
        .current_dir(&ctx.config.project_root)
        .env("NODE_ENV", ctx.config.node_env())
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| anyhow::anyhow!("Failed to start '{}': {}", tool.program, e))?;

    // Feed stdin concurrently so a tool that streams output cannot deadlock on a full pipe.
    let writer = match (stdin, child.stdin.take()) {
        (Some(input), Some(mut pipe)) => Some(tokio::spawn(async move {
            let result = pipe.write_all(&input).await;
            drop(pipe);
            result
        })),
        _ => None,
    };

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run '{}': {}", tool.program, e))?;

    if let Some(writer) = writer {
        match writer.await {
            Ok(Ok(())) => {}
            // a tool may legitimately stop reading early; its exit status decides
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
            Ok(Err(e)) => anyhow::bail!("Failed to write to '{}': {}", tool.program, e),
            Err(e) => anyhow::bail!("stdin writer for '{}' failed: {}", tool.program, e),
        }
    }

    if !output.status.success() {
        let code = output.status.code().unwrap_or(-1);
        anyhow::bail!(
            "'{}' exited with code {}: {}",
            tool.program,
            code,
            stderr_excerpt(&output.stderr)
        );
    }

    Ok(output.stdout)
}

/// Per-entry filter: stdin to stdout.
pub struct ToolFilter {
    label: String,
    tool: ToolCommand,
}

impl ToolFilter {
    pub fn new(label: impl Into<String>, tool: ToolCommand) -> Self {
        Self {
            label: label.into(),
            tool,
        }
    }
}

#[async_trait]
impl Stage for ToolFilter {
    fn name(&self) -> &str {
        &self.label
    }

    async fn apply(&self, batch: FileBatch, ctx: &StageContext) -> anyhow::Result<FileBatch> {
        let template = self.tool.args_for(ctx.config.production);
        let mut out = FileBatch::new();
        for entry in batch {
            let file = slash_path(&entry.path);
            // entries rewritten by an earlier stage have no file on disk
            let path = entry
                .source
                .as_ref()
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_else(|| file.clone());
            let args = template
                .iter()
                .map(|a| a.replace("{file}", &file).replace("{path}", &path))
                .collect();
            let stdout = run_tool(&self.tool, args, ctx, Some(entry.contents.clone()))
                .await
                .map_err(|e| anyhow::anyhow!("{}: {}", file, e))?;
            out.push(entry.with_contents(stdout));
        }
        Ok(out)
    }
}

/// Whole-batch tool.
///
/// Entries still backed by a source file are handed to the tool in place, so
/// it can resolve imports relative to them. Entries without one are written to
/// the scratch input directory first. The tool's output directory is always
/// scratch.
pub struct ToolBatch {
    label: String,
    tool: ToolCommand,
}

impl ToolBatch {
    pub fn new(label: impl Into<String>, tool: ToolCommand) -> Self {
        Self {
            label: label.into(),
            tool,
        }
    }

    fn expand_args(&self, production: bool, input: &Path, output: &Path, files: &[String]) -> Vec<String> {
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();
        let mut args = Vec::new();
        for arg in self.tool.args_for(production) {
            if arg == "{inputs}" {
                args.extend(files.iter().cloned());
            } else {
                args.push(arg.replace("{input}", &input).replace("{output}", &output));
            }
        }
        args
    }
}

#[async_trait]
impl Stage for ToolBatch {
    fn name(&self) -> &str {
        &self.label
    }

    async fn apply(&self, batch: FileBatch, ctx: &StageContext) -> anyhow::Result<FileBatch> {
        if batch.is_empty() {
            return Ok(batch);
        }

        let scratch = tempfile::tempdir()?;
        let input = scratch.path().join("in");
        let output = scratch.path().join("out");
        tokio::fs::create_dir_all(&input).await?;
        tokio::fs::create_dir_all(&output).await?;

        let mut files = Vec::with_capacity(batch.len());
        for entry in batch.iter() {
            let path = match &entry.source {
                Some(source) => source.clone(),
                None => {
                    let target = input.join(&entry.path);
                    if let Some(parent) = target.parent() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                    tokio::fs::write(&target, &entry.contents).await?;
                    target
                }
            };
            files.push(path.to_string_lossy().to_string());
        }

        let args = self.expand_args(ctx.config.production, &input, &output, &files);
        run_tool(&self.tool, args, ctx, None).await?;

        let produced = FileBatch::read(&output, &[Glob::new("**")?], &[]).await?;
        if produced.is_empty() {
            tracing::warn!(task = %ctx.task, "{} produced no output files", self.label);
        }
        Ok(produced)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::batch::FileEntry;
    use crate::config::Config;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn ctx(production: bool) -> StageContext {
        let config = Config::new("s", "b").with_production(production);
        StageContext::new("test", Arc::new(config))
    }

    fn sh(script: &str) -> ToolCommand {
        ToolCommand::new("/bin/sh", &["-c", script])
    }

    #[tokio::test]
    async fn filter_pipes_each_entry_through_the_tool() {
        let stage = ToolFilter::new("upper", sh("tr a-z A-Z"));
        let batch = FileBatch::from_entries(vec![
            FileEntry::new("a.css", "body{}"),
            FileEntry::new("b.css", "p{}"),
        ]);

        let out = stage.apply(batch, &ctx(false)).await.expect("apply");

        assert_eq!(out.paths(), vec![PathBuf::from("a.css"), PathBuf::from("b.css")]);
        assert_eq!(&out.entries()[0].contents[..], b"BODY{}");
        assert_eq!(&out.entries()[1].contents[..], b"P{}");
    }

    #[tokio::test]
    async fn filter_sees_node_env_and_file_placeholder() {
        let stage = ToolFilter::new(
            "env",
            ToolCommand::new("/bin/sh", &["-c", "printf '%s %s' \"$NODE_ENV\" \"$0\"", "{file}"]),
        );
        let batch = FileBatch::from_entries(vec![FileEntry::new("x/y.js", "")]);

        let out = stage.apply(batch, &ctx(true)).await.expect("apply");

        assert_eq!(&out.entries()[0].contents[..], b"production x/y.js");
    }

    #[tokio::test]
    async fn filter_path_placeholder_points_at_the_source_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let styles = temp.path().join("styles");
        std::fs::create_dir_all(&styles).unwrap();
        std::fs::write(styles.join("main.css"), "@import \"./vars.css\";").unwrap();
        std::fs::write(styles.join("vars.css"), ":root{}").unwrap();
        let batch = FileBatch::read(&styles, &[Glob::new("main.css").unwrap()], &[])
            .await
            .unwrap();
        // resolves the import next to the real file, not next to the cwd
        let stage = ToolFilter::new(
            "imports",
            sh("test -f \"$(dirname '{path}')/vars.css\" && cat"),
        );

        let out = stage.apply(batch, &ctx(false)).await.expect("apply");

        assert_eq!(&out.entries()[0].contents[..], b"@import \"./vars.css\";");
        assert!(out.entries()[0].source.is_none());
    }

    #[tokio::test]
    async fn filter_path_falls_back_to_relative_path() {
        let stage = ToolFilter::new(
            "echo",
            ToolCommand::new("/bin/sh", &["-c", "printf '%s' \"$0\"", "{path}"]),
        );
        let batch = FileBatch::from_entries(vec![FileEntry::new("css/a.css", "")]);

        let out = stage.apply(batch, &ctx(false)).await.expect("apply");

        assert_eq!(&out.entries()[0].contents[..], b"css/a.css");
    }

    #[tokio::test]
    async fn filter_failure_reports_stderr() {
        let stage = ToolFilter::new("broken", sh("echo 'Unexpected token' >&2; exit 3"));
        let batch = FileBatch::from_entries(vec![FileEntry::new("bad.css", "{")]);

        let err = stage.apply(batch, &ctx(false)).await.unwrap_err();
        let message = format!("{:#}", err);

        assert!(message.contains("bad.css"));
        assert!(message.contains("code 3"));
        assert!(message.contains("Unexpected token"));
    }

    #[tokio::test]
    async fn missing_program_is_a_stage_error() {
        let stage = ToolFilter::new("ghost", ToolCommand::new("assetflow-no-such-tool", &[]));
        let batch = FileBatch::from_entries(vec![FileEntry::new("a.css", "")]);
        assert!(stage.apply(batch, &ctx(false)).await.is_err());
    }

    #[tokio::test]
    async fn batch_mode_reads_back_output_directory() {
        let stage = ToolBatch::new(
            "sprite",
            ToolCommand::new("/bin/sh", &["-c", "cat \"$@\" > {output}/symbols.svg", "sh", "{inputs}"]),
        );
        let batch = FileBatch::from_entries(vec![
            FileEntry::new("a.svg", "<a/>"),
            FileEntry::new("nested/b.svg", "<b/>"),
        ]);

        let out = stage.apply(batch, &ctx(false)).await.expect("apply");

        assert_eq!(out.paths(), vec![PathBuf::from("symbols.svg")]);
        assert_eq!(&out.entries()[0].contents[..], b"<a/><b/>");
    }

    #[tokio::test]
    async fn batch_mode_passes_source_files_in_place() {
        let temp = tempfile::tempdir().expect("tempdir");
        let scripts = temp.path().join("scripts");
        std::fs::create_dir_all(scripts.join("lib")).unwrap();
        std::fs::write(scripts.join("index.js"), "main();").unwrap();
        std::fs::write(scripts.join("lib/util.js"), "util();").unwrap();
        let batch = FileBatch::read(&scripts, &[Glob::new("index.js").unwrap()], &[])
            .await
            .unwrap();
        let stage = ToolBatch::new(
            "bundler",
            ToolCommand::new(
                "/bin/sh",
                &[
                    "-c",
                    "cat \"$(dirname \"$1\")/lib/util.js\" \"$1\" > '{output}/bundle.js'",
                    "sh",
                    "{inputs}",
                ],
            ),
        );

        let out = stage.apply(batch, &ctx(false)).await.expect("apply");

        assert_eq!(out.paths(), vec![PathBuf::from("bundle.js")]);
        assert_eq!(&out.entries()[0].contents[..], b"util();main();");
    }

    #[tokio::test]
    async fn batch_mode_skips_empty_batches() {
        let stage = ToolBatch::new("never", sh("exit 1"));
        let out = stage.apply(FileBatch::new(), &ctx(false)).await.expect("apply");
        assert!(out.is_empty());
    }

    #[test]
    fn expand_args_substitutes_placeholders() {
        let stage = ToolBatch::new(
            "bundler",
            ToolCommand::new("esbuild", &["{inputs}", "--outdir={output}", "--root={input}"])
                .with_production_args(&["--minify"]),
        );
        let args = stage.expand_args(
            true,
            Path::new("/tmp/in"),
            Path::new("/tmp/out"),
            &["/tmp/in/index.js".to_string()],
        );
        assert_eq!(
            args,
            vec!["/tmp/in/index.js", "--outdir=/tmp/out", "--root=/tmp/in", "--minify"]
        );
    }
}
