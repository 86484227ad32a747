//! Task graph composer.
//!
//! Starts a list of task names in list order without waiting between them.
//! Entries switched off by a gate arrive as `None` and are skipped silently.
//! An unknown name is logged and skipped; the rest of the list still starts.

use std::sync::Arc;

use crate::runner::{InvocationOutcome, TaskHandle, TaskRunner};

/// What one [`Composer::run`] call started.
#[derive(Debug, Default)]
pub struct Launch {
    /// One handle per started entry, in list order.
    pub started: Vec<TaskHandle>,
    /// Entries that named no registered task.
    pub rejected: Vec<String>,
}

impl Launch {
    pub fn started_names(&self) -> Vec<&str> {
        self.started.iter().map(|h| h.name.as_str()).collect()
    }

    /// Wait for every started task. Outcomes come back in start order.
    pub async fn wait_all(self) -> Vec<InvocationOutcome> {
        futures::future::join_all(self.started.into_iter().map(TaskHandle::wait)).await
    }
}

#[derive(Clone)]
pub struct Composer {
    runner: Arc<TaskRunner>,
}

impl Composer {
    pub fn new(runner: Arc<TaskRunner>) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &Arc<TaskRunner> {
        &self.runner
    }

    pub fn run<I>(&self, entries: I) -> Launch
    where
        I: IntoIterator<Item = Option<String>>,
    {
        let mut launch = Launch::default();
        for name in entries.into_iter().flatten() {
            match self.runner.trigger(&name) {
                Ok(handle) => launch.started.push(handle),
                Err(e) => {
                    tracing::error!("Cannot start '{}': {}", name, e);
                    launch.rejected.push(name);
                }
            }
        }
        launch
    }
}
