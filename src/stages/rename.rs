use async_trait::async_trait;

use super::{Stage, StageContext};
use crate::batch::{FileBatch, FileEntry};

/// Replace the file name of every entry, keeping its directory.
pub struct Rename {
    file_name: String,
}

impl Rename {
    pub fn to(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }
}

#[async_trait]
impl Stage for Rename {
    fn name(&self) -> &str {
        "rename"
    }

    async fn apply(&self, batch: FileBatch, _ctx: &StageContext) -> anyhow::Result<FileBatch> {
        Ok(batch
            .into_iter()
            .map(|entry| FileEntry {
                path: entry.path.with_file_name(&self.file_name),
                ..entry
            })
            .collect())
    }
}
