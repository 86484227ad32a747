use async_trait::async_trait;
use bytes::{BufMut, BytesMut};

use super::{Stage, StageContext};
use crate::batch::{FileBatch, FileEntry};

/// Join every entry into one file, in batch order, separated by newlines.
pub struct Concat {
    file_name: String,
}

impl Concat {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }
}

#[async_trait]
impl Stage for Concat {
    fn name(&self) -> &str {
        "concat"
    }

    async fn apply(&self, batch: FileBatch, _ctx: &StageContext) -> anyhow::Result<FileBatch> {
        if batch.is_empty() {
            return Ok(batch);
        }

        let newest = batch.iter().filter_map(|e| e.modified).max();
        let mut joined = BytesMut::new();
        for (i, entry) in batch.iter().enumerate() {
            if i > 0 {
                joined.put_u8(b'\n');
            }
            joined.put_slice(&entry.contents);
        }

        let mut out = FileEntry::new(&self.file_name, joined.freeze());
        out.modified = newest;
        Ok(FileBatch::from_entries(vec![out]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::path::PathBuf;
    use std::sync::Arc;

    #[tokio::test]
    async fn joins_in_order_with_newlines() {
        let ctx = StageContext::new("scripts-deps", Arc::new(Config::new("s", "b")));
        let batch = FileBatch::from_entries(vec![
            FileEntry::new("a.js", "var a;"),
            FileEntry::new("lib/b.js", "var b;"),
        ]);

        let out = Concat::new("vendors.js").apply(batch, &ctx).await.unwrap();

        assert_eq!(out.paths(), vec![PathBuf::from("vendors.js")]);
        assert_eq!(&out.entries()[0].contents[..], b"var a;\nvar b;");
    }

    #[tokio::test]
    async fn empty_batch_produces_nothing() {
        let ctx = StageContext::new("scripts-deps", Arc::new(Config::new("s", "b")));
        let out = Concat::new("vendors.js").apply(FileBatch::new(), &ctx).await.unwrap();
        assert!(out.is_empty());
    }
}
