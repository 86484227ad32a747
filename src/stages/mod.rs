//! Pipeline stages.
//!
//! A stage consumes a [`FileBatch`] and produces a new one. Stages may filter,
//! transform, rename or merge entries. Heavy lifting (CSS transforms,
//! minification, bundling, image recompression, sprite assembly) is delegated
//! to external programs through [`ToolFilter`] and [`ToolBatch`]; the other
//! stages are small in-process batch manipulations.

mod changed;
mod concat;
mod rename;
mod tool;

pub use changed::Changed;
pub use concat::Concat;
pub use rename::Rename;
pub use tool::{ToolBatch, ToolFilter};

use std::sync::Arc;

use async_trait::async_trait;

use crate::batch::FileBatch;
use crate::config::Config;

/// What a stage can see about the invocation it runs in.
#[derive(Debug, Clone)]
pub struct StageContext {
    /// Name of the task being invoked.
    pub task: String,
    pub config: Arc<Config>,
}

impl StageContext {
    pub fn new(task: impl Into<String>, config: Arc<Config>) -> Self {
        Self {
            task: task.into(),
            config,
        }
    }
}

/// Trait for implementing stages.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Transform the batch.
    async fn apply(&self, batch: FileBatch, ctx: &StageContext) -> anyhow::Result<FileBatch>;
}

pub type StageRef = Arc<dyn Stage>;

/// A stage that returns its input unchanged.
///
/// Stands in for a gated stage that is switched off, so the pipeline keeps
/// its shape.
#[derive(Debug, Clone)]
pub struct Passthrough {
    name: String,
}

impl Passthrough {
    pub fn new() -> Self {
        Self {
            name: "passthrough".to_string(),
        }
    }

    /// A passthrough that reports the name of the stage it replaces.
    pub fn replacing(name: &str) -> Self {
        Self {
            name: format!("{} (off)", name),
        }
    }
}

impl Default for Passthrough {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for Passthrough {
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, batch: FileBatch, _ctx: &StageContext) -> anyhow::Result<FileBatch> {
        Ok(batch)
    }
}
