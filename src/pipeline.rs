//! Ordered stage execution.
//!
//! A [`Pipeline`] applies its stages in order to one batch. The first failing
//! stage stops the run; the caller only writes the final batch, so a failed
//! run leaves the destination untouched.

use std::time::Instant;

use thiserror::Error;

use crate::batch::FileBatch;
use crate::stages::{StageContext, StageRef};

#[derive(Debug, Error)]
#[error("stage '{stage}' (#{index}) failed: {source:#}")]
pub struct PipelineError {
    pub stage: String,
    pub index: usize,
    #[source]
    pub source: anyhow::Error,
}

#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<StageRef>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage.
    pub fn then(mut self, stage: StageRef) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stage_names(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.name().to_string()).collect()
    }

    pub async fn run(&self, mut batch: FileBatch, ctx: &StageContext) -> Result<FileBatch, PipelineError> {
        for (index, stage) in self.stages.iter().enumerate() {
            let started = Instant::now();
            let input_len = batch.len();
            batch = stage
                .apply(batch, ctx)
                .await
                .map_err(|source| PipelineError {
                    stage: stage.name().to_string(),
                    index,
                    source,
                })?;
            tracing::debug!(
                task = %ctx.task,
                stage = stage.name(),
                "{} -> {} entries in {:?}",
                input_len,
                batch.len(),
                started.elapsed()
            );
        }
        Ok(batch)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.stage_names()).finish()
    }
}
