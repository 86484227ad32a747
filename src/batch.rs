//! The file batch flowing through a pipeline.
//!
//! A batch is an ordered list of `(relative path, contents)` entries. It is
//! read from a source directory at the start of an invocation, transformed by
//! stages, and written under a destination directory at the end. Nothing is
//! kept between invocations.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bytes::Bytes;
use walkdir::WalkDir;

use crate::glob::Glob;

/// One file in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
    /// Path relative to the source base (and later, the destination).
    pub path: PathBuf,
    pub contents: Bytes,
    /// Modification time of the source file, when read from disk.
    pub modified: Option<SystemTime>,
    /// Absolute path of the on-disk file holding exactly `contents`. Cleared
    /// once a stage rewrites the contents.
    pub source: Option<PathBuf>,
}

impl FileEntry {
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<Bytes>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
            modified: None,
            source: None,
        }
    }

    /// Same entry with different contents; path and timestamp are kept, the
    /// on-disk source no longer applies.
    pub fn with_contents(&self, contents: impl Into<Bytes>) -> Self {
        Self {
            path: self.path.clone(),
            contents: contents.into(),
            modified: self.modified,
            source: None,
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileBatch {
    entries: Vec<FileEntry>,
}

impl FileBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<FileEntry>) -> Self {
        Self { entries }
    }

    pub fn push(&mut self, entry: FileEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.iter()
    }

    pub fn into_entries(self) -> Vec<FileEntry> {
        self.entries
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.entries.iter().map(|e| e.path.clone()).collect()
    }

    /// Read every file under `base` whose relative path matches one of
    /// `include` and none of `exclude`. Entries are ordered by relative path
    /// so repeated reads of unchanged sources give identical batches.
    pub async fn read(base: &Path, include: &[Glob], exclude: &[Glob]) -> anyhow::Result<Self> {
        if !base.is_dir() {
            tracing::debug!("Source directory {} does not exist, empty batch", base.display());
            return Ok(Self::new());
        }

        let mut matched = Vec::new();
        let walker = WalkDir::new(base).sort_by_file_name().follow_links(true);
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(base).unwrap_or(entry.path());
            if !include.iter().any(|g| g.matches_path(relative)) {
                continue;
            }
            if exclude.iter().any(|g| g.matches_path(relative)) {
                continue;
            }
            matched.push((entry.path().to_path_buf(), relative.to_path_buf()));
        }
        matched.sort_by(|a, b| a.1.cmp(&b.1));

        let mut batch = Self::new();
        for (full, relative) in matched {
            let contents = tokio::fs::read(&full)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", full.display(), e))?;
            let modified = tokio::fs::metadata(&full)
                .await
                .ok()
                .and_then(|m| m.modified().ok());
            let source = tokio::fs::canonicalize(&full).await.unwrap_or(full);
            batch.push(FileEntry {
                path: relative,
                contents: Bytes::from(contents),
                modified,
                source: Some(source),
            });
        }
        Ok(batch)
    }

    /// Write every entry under `dest`, creating directories as needed.
    /// Returns the written paths.
    pub async fn write_to(&self, dest: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let target = dest.join(&entry.path);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&target, &entry.contents).await?;
            written.push(target);
        }
        Ok(written)
    }
}

impl IntoIterator for FileBatch {
    type Item = FileEntry;
    type IntoIter = std::vec::IntoIter<FileEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl FromIterator<FileEntry> for FileBatch {
    fn from_iter<I: IntoIterator<Item = FileEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn globs(patterns: &[&str]) -> Vec<Glob> {
        patterns.iter().map(|p| Glob::new(p).unwrap()).collect()
    }

    #[tokio::test]
    async fn read_filters_and_orders_entries() {
        let temp = tempfile::tempdir().expect("tempdir");
        let base = temp.path();
        std::fs::create_dir_all(base.join("vendors")).unwrap();
        std::fs::write(base.join("b.css"), "b").unwrap();
        std::fs::write(base.join("a.css"), "a").unwrap();
        std::fs::write(base.join("notes.txt"), "x").unwrap();
        std::fs::write(base.join("vendors/reset.css"), "r").unwrap();

        let batch = FileBatch::read(base, &globs(&["**/*.css"]), &globs(&["vendors/**"]))
            .await
            .expect("read");

        assert_eq!(
            batch.paths(),
            vec![PathBuf::from("a.css"), PathBuf::from("b.css")]
        );
        assert_eq!(batch.entries()[0].contents, Bytes::from("a"));
        assert!(batch.entries()[0].modified.is_some());
        let source = batch.entries()[0].source.clone().expect("source path");
        assert!(source.is_absolute());
        assert!(source.ends_with("a.css"));
    }

    #[test]
    fn rewriting_contents_drops_source() {
        let mut entry = FileEntry::new("a.css", "a");
        entry.source = Some(PathBuf::from("/project/src/styles/a.css"));

        let rewritten = entry.with_contents("b");

        assert_eq!(rewritten.path, entry.path);
        assert!(rewritten.source.is_none());
    }

    #[tokio::test]
    async fn read_of_missing_directory_is_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let batch = FileBatch::read(&temp.path().join("nope"), &globs(&["**"]), &[])
            .await
            .expect("read");
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn write_to_creates_nested_directories() {
        let temp = tempfile::tempdir().expect("tempdir");
        let batch = FileBatch::from_entries(vec![
            FileEntry::new("top.js", "1"),
            FileEntry::new("deep/er/file.js", "2"),
        ]);

        let written = batch.write_to(temp.path()).await.expect("write");

        assert_eq!(written.len(), 2);
        assert_eq!(std::fs::read_to_string(temp.path().join("deep/er/file.js")).unwrap(), "2");
    }
}
