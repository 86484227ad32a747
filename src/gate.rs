//! Flag gating for stages and task lists.
//!
//! A gate reads the immutable [`Config`]; it never consults process state.
//! A stage that is switched off becomes a [`Passthrough`] in the same slot.
//! A task-list entry that is switched off becomes `None`, which the composer
//! skips silently.

use std::sync::Arc;

use crate::config::Config;
use crate::stages::{Passthrough, StageRef};

#[derive(Debug, Clone)]
pub struct Gate {
    config: Arc<Config>,
}

impl Gate {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// `stage` when `flag` holds, a passthrough otherwise.
    pub fn stage_when(flag: bool, stage: StageRef) -> StageRef {
        if flag {
            stage
        } else {
            Arc::new(Passthrough::replacing(stage.name()))
        }
    }

    /// Minification and other production-only stages.
    pub fn production_only(&self, stage: StageRef) -> StageRef {
        Self::stage_when(self.config.production, stage)
    }

    /// A task-list entry, or `None` when `flag` is off.
    pub fn when(flag: bool, name: &str) -> Option<String> {
        flag.then(|| name.to_string())
    }

    /// Script tasks that only run on startup when asked to.
    pub fn initial_scripts(&self, name: &str) -> Option<String> {
        Self::when(self.config.initial_scripts, name)
    }

    /// Whether the live-reload server runs, and against which target.
    pub fn proxy(&self) -> Option<&str> {
        self.config.proxy.as_deref()
    }
}
