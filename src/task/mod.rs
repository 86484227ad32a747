//! Task definitions.
//!
//! # Invariants
//! - `name` is unique within a [`TaskRegistry`] (last registration wins)
//! - a task is immutable after registration; every invocation reads its
//!   sources afresh

mod registry;

pub use registry::{enumerate_sources, SourceFile, TaskInfo, TaskRegistry};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::batch::FileBatch;
use crate::config::Config;
use crate::glob::Glob;
use crate::pipeline::{Pipeline, PipelineError};
use crate::stages::{StageContext, StageRef};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Source directory {path} cannot be listed: {source}")]
    MissingSourceDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Failed to read sources for '{task}': {source:#}")]
    Source {
        task: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Failed to write {dest}: {source}")]
    Write {
        dest: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Which files a task reads: every file under `base` matching an include
/// pattern and no exclude pattern.
#[derive(Debug, Clone)]
pub struct SourceSet {
    pub base: PathBuf,
    pub include: Vec<Glob>,
    pub exclude: Vec<Glob>,
}

impl SourceSet {
    pub fn new(base: impl Into<PathBuf>, include: &[&str]) -> anyhow::Result<Self> {
        Ok(Self {
            base: base.into(),
            include: include.iter().map(|p| Glob::new(p)).collect::<anyhow::Result<_>>()?,
            exclude: Vec::new(),
        })
    }

    /// A set holding exactly one file.
    pub fn single(path: &Path) -> anyhow::Result<Self> {
        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| anyhow::anyhow!("Not a file path: {}", path.display()))?;
        Ok(Self {
            base,
            include: vec![Glob::new(&glob_literal(&name))?],
            exclude: Vec::new(),
        })
    }

    pub async fn read(&self) -> anyhow::Result<FileBatch> {
        FileBatch::read(&self.base, &self.include, &self.exclude).await
    }
}

/// Replace glob metacharacters with `?` so a literal file name still matches
/// itself.
fn glob_literal(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '*' | '?' | '{' | '}' | ',' => '?',
            other => other,
        })
        .collect()
}

/// A named unit of build work.
#[derive(Debug, Clone)]
pub struct Task {
    pub name: String,
    /// Human-readable label used in error messages.
    pub label: String,
    pub source: SourceSet,
    pub pipeline: Pipeline,
    pub dest: PathBuf,
}

/// What one successful invocation did.
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub invocation_id: Uuid,
    pub task: String,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub files_read: usize,
    pub files_written: Vec<PathBuf>,
}

impl Task {
    pub fn new(name: impl Into<String>, label: impl Into<String>, source: SourceSet, dest: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            source,
            pipeline: Pipeline::new(),
            dest: dest.into(),
        }
    }

    /// Append a stage to the pipeline.
    pub fn stage(mut self, stage: StageRef) -> Self {
        self.pipeline = self.pipeline.then(stage);
        self
    }

    /// Read, transform, write. Nothing is written unless every stage succeeds.
    pub async fn run(&self, config: Arc<Config>) -> Result<TaskReport, TaskError> {
        let invocation_id = Uuid::new_v4();
        let started_at = Utc::now();
        let started = Instant::now();

        let batch = self.source.read().await.map_err(|source| TaskError::Source {
            task: self.name.clone(),
            source,
        })?;
        let files_read = batch.len();

        let ctx = StageContext::new(&self.name, config);
        let output = self.pipeline.run(batch, &ctx).await?;

        let files_written = output.write_to(&self.dest).await.map_err(|source| TaskError::Write {
            dest: self.dest.clone(),
            source,
        })?;

        Ok(TaskReport {
            invocation_id,
            task: self.name.clone(),
            started_at,
            duration: started.elapsed(),
            files_read,
            files_written,
        })
    }
}
