//! Guarded task invocation.
//!
//! Every invocation runs inside a guard that turns failures (including
//! panics) into a logged, labeled [`InvocationOutcome::Failed`]. Nothing
//! propagates to sibling tasks or to the watch loop.
//!
//! Invocations of the same task are serialized through a single slot per task
//! name:
//!
//! ```text
//!  Idle ──trigger──▶ Running ──done──▶ Idle
//!                     │   ▲
//!              trigger│   │done (rerun pending)
//!                     ▼   │
//!                Running + rerun
//! ```
//!
//! Any number of triggers that arrive while a run is in flight collapse into
//! one more run after the current one finishes. Every trigger gets a
//! [`TaskHandle`] that resolves with the outcome of the run that covers it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use tokio::sync::oneshot;

use crate::config::Config;
use crate::task::{Task, TaskError, TaskRegistry, TaskReport};

/// Result of one guarded invocation.
#[derive(Debug, Clone)]
pub enum InvocationOutcome {
    Succeeded(TaskReport),
    Failed {
        task: String,
        /// Human-readable label, as used in the failure log line.
        label: String,
        error: String,
    },
}

impl InvocationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, InvocationOutcome::Succeeded(_))
    }
}

/// Awaitable completion of a triggered task.
#[derive(Debug)]
pub struct TaskHandle {
    pub name: String,
    pub label: String,
    /// True when the trigger folded into a rerun of an in-flight task.
    pub coalesced: bool,
    rx: oneshot::Receiver<InvocationOutcome>,
}

impl TaskHandle {
    pub async fn wait(self) -> InvocationOutcome {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => InvocationOutcome::Failed {
                task: self.name,
                label: self.label,
                error: "invocation dropped before completion".to_string(),
            },
        }
    }
}

type Waiters = Vec<oneshot::Sender<InvocationOutcome>>;

enum SlotState {
    Idle,
    Running {
        current: Waiters,
        next: Waiters,
        rerun: bool,
    },
}

/// Starts tasks from a registry, one slot per task name.
pub struct TaskRunner {
    registry: Arc<TaskRegistry>,
    config: Arc<Config>,
    slots: Mutex<HashMap<String, SlotState>>,
}

impl TaskRunner {
    pub fn new(registry: Arc<TaskRegistry>, config: Arc<Config>) -> Arc<Self> {
        Arc::new(Self {
            registry,
            config,
            slots: Mutex::new(HashMap::new()),
        })
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Start `name`, or queue one rerun if it is already running.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::UnknownTask` if no task is registered under `name`.
    pub fn trigger(self: &Arc<Self>, name: &str) -> Result<TaskHandle, TaskError> {
        let task = self
            .registry
            .get(name)
            .ok_or_else(|| TaskError::UnknownTask(name.to_string()))?;
        let (tx, rx) = oneshot::channel();

        let coalesced = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            match slots.get_mut(name) {
                Some(SlotState::Running { next, rerun, .. }) => {
                    next.push(tx);
                    *rerun = true;
                    true
                }
                _ => {
                    slots.insert(
                        name.to_string(),
                        SlotState::Running {
                            current: vec![tx],
                            next: Vec::new(),
                            rerun: false,
                        },
                    );
                    false
                }
            }
        };

        if coalesced {
            tracing::debug!("'{}' is running, queued one more run", name);
        } else {
            let runner = Arc::clone(self);
            let task = Arc::clone(&task);
            tokio::spawn(async move { runner.drive(task).await });
        }

        Ok(TaskHandle {
            name: name.to_string(),
            label: task.label.clone(),
            coalesced,
            rx,
        })
    }

    /// Whether `name` has a run in flight.
    pub fn is_running(&self, name: &str) -> bool {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        matches!(slots.get(name), Some(SlotState::Running { .. }))
    }

    async fn drive(self: Arc<Self>, task: Arc<Task>) {
        loop {
            let outcome = self.invoke(&task).await;

            let (current, again) = {
                let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
                let state = slots.remove(&task.name).unwrap_or(SlotState::Idle);
                match state {
                    SlotState::Running {
                        current,
                        next,
                        rerun: true,
                    } => {
                        slots.insert(
                            task.name.clone(),
                            SlotState::Running {
                                current: next,
                                next: Vec::new(),
                                rerun: false,
                            },
                        );
                        (current, true)
                    }
                    SlotState::Running { current, .. } => (current, false),
                    SlotState::Idle => (Vec::new(), false),
                }
            };

            for waiter in current {
                let _ = waiter.send(outcome.clone());
            }
            if !again {
                return;
            }
        }
    }

    /// One guarded run: logs start, finish and failure with the task label.
    async fn invoke(&self, task: &Task) -> InvocationOutcome {
        tracing::info!(task = %task.name, "Starting '{}'", task.name);

        let result = std::panic::AssertUnwindSafe(task.run(Arc::clone(&self.config)))
            .catch_unwind()
            .await;

        match result {
            Ok(Ok(report)) => {
                tracing::info!(
                    task = %task.name,
                    invocation = %report.invocation_id,
                    "Finished '{}' after {:?} ({} read, {} written)",
                    task.name,
                    report.duration,
                    report.files_read,
                    report.files_written.len()
                );
                InvocationOutcome::Succeeded(report)
            }
            Ok(Err(e)) => {
                tracing::error!(task = %task.name, "{} build failed! {}", task.label, e);
                InvocationOutcome::Failed {
                    task: task.name.clone(),
                    label: task.label.clone(),
                    error: e.to_string(),
                }
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(task = %task.name, "{} build failed! panicked: {}", task.label, message);
                InvocationOutcome::Failed {
                    task: task.name.clone(),
                    label: task.label.clone(),
                    error: format!("panicked: {}", message),
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::batch::FileBatch;
    use crate::stages::{Stage, StageContext};
    use crate::task::SourceSet;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Counts invocations and takes a little time, so triggers can overlap.
    pub(crate) struct Counting {
        pub runs: Arc<AtomicUsize>,
        pub delay: Duration,
    }

    #[async_trait]
    impl Stage for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        async fn apply(&self, batch: FileBatch, _ctx: &StageContext) -> anyhow::Result<FileBatch> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(batch)
        }
    }

    struct Panics;

    #[async_trait]
    impl Stage for Panics {
        fn name(&self) -> &str {
            "panics"
        }

        async fn apply(&self, _batch: FileBatch, _ctx: &StageContext) -> anyhow::Result<FileBatch> {
            panic!("stage blew up")
        }
    }

    struct Fails;

    #[async_trait]
    impl Stage for Fails {
        fn name(&self) -> &str {
            "fails"
        }

        async fn apply(&self, _batch: FileBatch, _ctx: &StageContext) -> anyhow::Result<FileBatch> {
            anyhow::bail!("unexpected token")
        }
    }

    pub(crate) fn counting_task(name: &str, root: &std::path::Path, runs: Arc<AtomicUsize>) -> Task {
        Task::new(name, name, SourceSet::new(root.join("src"), &["**"]).unwrap(), root.join("build"))
            .stage(Arc::new(Counting {
                runs,
                delay: Duration::from_millis(30),
            }))
    }

    #[tokio::test]
    async fn unknown_task_is_rejected() {
        let runner = TaskRunner::new(Arc::new(TaskRegistry::new()), Arc::new(Config::new("s", "b")));
        assert!(matches!(runner.trigger("nope"), Err(TaskError::UnknownTask(n)) if n == "nope"));
    }

    #[tokio::test]
    async fn overlapping_triggers_coalesce_into_one_rerun() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runs = Arc::new(AtomicUsize::new(0));
        let mut registry = TaskRegistry::new();
        registry.register(counting_task("styles", temp.path(), Arc::clone(&runs)));
        let runner = TaskRunner::new(Arc::new(registry), Arc::new(Config::new("s", "b")));

        let first = runner.trigger("styles").unwrap();
        let second = runner.trigger("styles").unwrap();
        let third = runner.trigger("styles").unwrap();

        assert!(!first.coalesced);
        assert!(second.coalesced && third.coalesced);
        assert!(runner.is_running("styles"));

        assert!(first.wait().await.is_success());
        assert!(second.wait().await.is_success());
        assert!(third.wait().await.is_success());
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert!(!runner.is_running("styles"));
    }

    #[tokio::test]
    async fn sequential_triggers_each_run() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runs = Arc::new(AtomicUsize::new(0));
        let mut registry = TaskRegistry::new();
        registry.register(counting_task("icons", temp.path(), Arc::clone(&runs)));
        let runner = TaskRunner::new(Arc::new(registry), Arc::new(Config::new("s", "b")));

        runner.trigger("icons").unwrap().wait().await;
        runner.trigger("icons").unwrap().wait().await;

        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn panicking_stage_is_contained() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut registry = TaskRegistry::new();
        registry.register(
            Task::new("boom", "Boom", SourceSet::new(temp.path(), &["**"]).unwrap(), temp.path())
                .stage(Arc::new(Panics)),
        );
        let runner = TaskRunner::new(Arc::new(registry), Arc::new(Config::new("s", "b")));

        let outcome = runner.trigger("boom").unwrap().wait().await;

        match outcome {
            InvocationOutcome::Failed { task, label, error } => {
                assert_eq!(task, "boom");
                assert_eq!(label, "Boom");
                assert!(error.contains("stage blew up"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(!runner.is_running("boom"));
        // the slot is usable again
        assert!(runner.trigger("boom").is_ok());
    }

    #[tokio::test]
    async fn stage_error_is_reported_with_label() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut registry = TaskRegistry::new();
        registry.register(
            Task::new("styles", "Styles", SourceSet::new(temp.path(), &["**"]).unwrap(), temp.path())
                .stage(Arc::new(Fails)),
        );
        let runner = TaskRunner::new(Arc::new(registry), Arc::new(Config::new("s", "b")));

        let handle = runner.trigger("styles").unwrap();
        assert_eq!(handle.label, "Styles");

        match handle.wait().await {
            InvocationOutcome::Failed { task, label, error } => {
                assert_eq!(task, "styles");
                assert_eq!(label, "Styles");
                assert!(error.contains("unexpected token"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }
}
