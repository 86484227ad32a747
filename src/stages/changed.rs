use std::path::PathBuf;

use async_trait::async_trait;

use super::{Stage, StageContext};
use crate::batch::FileBatch;

/// Drop entries whose destination copy is at least as new as the source.
///
/// Entries without a source timestamp, or without a destination copy, always
/// pass.
pub struct Changed {
    dest: PathBuf,
}

impl Changed {
    pub fn since(dest: impl Into<PathBuf>) -> Self {
        Self { dest: dest.into() }
    }
}

#[async_trait]
impl Stage for Changed {
    fn name(&self) -> &str {
        "changed"
    }

    async fn apply(&self, batch: FileBatch, ctx: &StageContext) -> anyhow::Result<FileBatch> {
        let total = batch.len();
        let mut kept = FileBatch::new();
        for entry in batch {
            let Some(source_time) = entry.modified else {
                kept.push(entry);
                continue;
            };
            let dest_time = tokio::fs::metadata(self.dest.join(&entry.path))
                .await
                .ok()
                .and_then(|m| m.modified().ok());
            match dest_time {
                Some(t) if t >= source_time => {}
                _ => kept.push(entry),
            }
        }
        tracing::debug!(
            task = %ctx.task,
            "changed: {} of {} entries need rebuilding",
            kept.len(),
            total
        );
        Ok(kept)
    }
}
