//! External tool commands.
//!
//! Every collaborator (CSS processor, minifiers, bundler, image and SVG
//! optimizers, sprite assembler) is an external program. The defaults below
//! assume the usual npm packages are installed in the project; any of them can
//! be replaced from a JSON file:
//!
//! ```json
//! {
//!   "css_minifier": { "program": "npx", "args": ["lightningcss", "--minify"] },
//!   "bundler": { "program": "npx", "args": ["esbuild", "{inputs}", "--bundle", "--outdir={output}"] }
//! }
//! ```
//!
//! Placeholders:
//! - `{file}` - relative path of the entry being filtered (filter mode)
//! - `{path}` - absolute path of the entry's source file, so the tool can
//!   resolve imports next to it; the relative path once an earlier stage has
//!   rewritten the contents (filter mode)
//! - `{input}` / `{output}` - scratch input and output directories (batch mode)
//! - `{inputs}` - one argument per input file, pointing at the source file
//!   itself when there is one (batch mode, must stand alone)

use std::path::Path;

use serde::{Deserialize, Serialize};

/// One external command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Appended in production mode only
    #[serde(default)]
    pub production_args: Vec<String>,
    /// Appended outside production mode only
    #[serde(default)]
    pub development_args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            production_args: Vec::new(),
            development_args: Vec::new(),
        }
    }

    pub fn with_production_args(mut self, args: &[&str]) -> Self {
        self.production_args = args.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_development_args(mut self, args: &[&str]) -> Self {
        self.development_args = args.iter().map(|a| a.to_string()).collect();
        self
    }

    /// Argument template for the given mode, before placeholder expansion.
    pub fn args_for(&self, production: bool) -> Vec<String> {
        let extra = if production {
            &self.production_args
        } else {
            &self.development_args
        };
        self.args.iter().chain(extra.iter()).cloned().collect()
    }

}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Toolchain {
    pub css_processor: ToolCommand,
    pub css_minifier: ToolCommand,
    pub js_minifier: ToolCommand,
    pub bundler: ToolCommand,
    pub image_optimizer: ToolCommand,
    pub svg_optimizer: ToolCommand,
    pub sprite_assembler: ToolCommand,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            css_processor: ToolCommand::new("npx", &["postcss", "--from", "{path}"]),
            css_minifier: ToolCommand::new("npx", &["csso"]),
            js_minifier: ToolCommand::new("npx", &["uglifyjs", "--compress", "--mangle"]),
            bundler: ToolCommand::new(
                "npx",
                &["esbuild", "{inputs}", "--bundle", "--outdir={output}"],
            )
            .with_production_args(&["--minify", "--define:PRODUCTION=true"])
            .with_development_args(&["--sourcemap", "--define:PRODUCTION=false"]),
            image_optimizer: ToolCommand::new("npx", &["imagemin"]),
            svg_optimizer: ToolCommand::new("npx", &["svgo", "--input", "-", "--output", "-"]),
            sprite_assembler: ToolCommand::new(
                "npx",
                &[
                    "svg-sprite",
                    "--symbol",
                    "--symbol-dest",
                    "{output}",
                    "--symbol-sprite",
                    "symbols.svg",
                    "{inputs}",
                ],
            ),
        }
    }
}

impl Toolchain {
    /// Load overrides from `path`, or the defaults when no path is given.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or parsed.
    pub async fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read toolchain {}: {}", path.display(), e))?;
        let toolchain: Self = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid toolchain {}: {}", path.display(), e))?;
        tracing::info!("Loaded toolchain overrides from {}", path.display());
        Ok(toolchain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_for_appends_mode_specific_args() {
        let tool = ToolCommand::new("esbuild", &["in.js"])
            .with_production_args(&["--minify"])
            .with_development_args(&["--sourcemap"]);
        assert_eq!(tool.args_for(true), vec!["in.js", "--minify"]);
        assert_eq!(tool.args_for(false), vec!["in.js", "--sourcemap"]);
    }

    #[tokio::test]
    async fn load_without_path_gives_defaults() {
        let toolchain = Toolchain::load(None).await.expect("load");
        assert_eq!(toolchain, Toolchain::default());
    }

    #[tokio::test]
    async fn load_merges_partial_overrides() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("assetflow.json");
        std::fs::write(
            &path,
            r#"{ "css_minifier": { "program": "lightningcss", "args": ["--minify"] } }"#,
        )
        .unwrap();

        let toolchain = Toolchain::load(Some(&path)).await.expect("load");

        assert_eq!(toolchain.css_minifier.program, "lightningcss");
        assert!(toolchain.css_minifier.production_args.is_empty());
        assert_eq!(toolchain.bundler, Toolchain::default().bundler);
    }

    #[tokio::test]
    async fn load_rejects_malformed_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("assetflow.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(Toolchain::load(Some(&path)).await.is_err());
    }
}
