//! Watch mode.
//!
//! Monitors the source root and re-runs the tasks subscribed to whatever
//! changed. Bursts of filesystem events are coalesced by the debouncer; each
//! debounced batch triggers every matching task exactly once, however many of
//! its files changed. Once the triggered runs finish, connected browsers are
//! told to reload.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use notify::{RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult};
use tokio::sync::mpsc;

use crate::composer::Composer;
use crate::glob::Glob;
use crate::runner::TaskHandle;
use crate::server::ReloadHub;

/// Re-run `tasks` whenever a path under the source root matches `pattern`.
#[derive(Debug, Clone)]
pub struct WatchSubscription {
    pub pattern: Glob,
    pub tasks: Vec<String>,
}

impl WatchSubscription {
    pub fn new(pattern: &str, tasks: &[&str]) -> anyhow::Result<Self> {
        Ok(Self {
            pattern: Glob::new(pattern)?,
            tasks: tasks.iter().map(|t| t.to_string()).collect(),
        })
    }
}

pub struct WatchTrigger {
    root: PathBuf,
    subscriptions: Vec<WatchSubscription>,
    composer: Composer,
    reload: Option<ReloadHub>,
    debounce: Duration,
}

impl WatchTrigger {
    /// `root` is the source root; subscription patterns are relative to it.
    pub fn new(root: &Path, subscriptions: Vec<WatchSubscription>, composer: Composer) -> Self {
        let absolute = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(root))
                .unwrap_or_else(|_| root.to_path_buf())
        };
        let root = absolute.canonicalize().unwrap_or(absolute);

        Self {
            root,
            subscriptions,
            composer,
            reload: None,
            debounce: Duration::from_millis(200),
        }
    }

    pub fn with_reload(mut self, reload: ReloadHub) -> Self {
        self.reload = Some(reload);
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Task names subscribed to any of `paths`, deduplicated, in
    /// subscription order. Paths outside the root are ignored.
    pub fn matching_tasks(&self, paths: &[PathBuf]) -> Vec<String> {
        let relative: Vec<&Path> = paths
            .iter()
            .filter_map(|p| p.strip_prefix(&self.root).ok())
            .collect();

        let mut names: Vec<String> = Vec::new();
        for sub in &self.subscriptions {
            if !relative.iter().any(|p| sub.pattern.matches_path(p)) {
                continue;
            }
            for task in &sub.tasks {
                if !names.contains(task) {
                    names.push(task.clone());
                }
            }
        }
        names
    }

    /// Trigger every task matching one batch of changed paths.
    pub fn dispatch(&self, paths: &[PathBuf]) -> Vec<TaskHandle> {
        let names = self.matching_tasks(paths);
        if names.is_empty() {
            tracing::debug!("{} changed paths matched no subscription", paths.len());
            return Vec::new();
        }
        tracing::info!("Change detected, re-running {}", names.join(", "));
        self.composer.run(names.into_iter().map(Some)).started
    }

    /// Dispatch a batch and send a reload once the triggered runs finish.
    fn dispatch_and_reload(&self, paths: &[PathBuf]) {
        let handles = self.dispatch(paths);
        if handles.is_empty() {
            return;
        }
        let Some(reload) = self.reload.clone() else {
            return;
        };
        tokio::spawn(async move {
            let outcomes = futures::future::join_all(handles.into_iter().map(TaskHandle::wait)).await;
            if outcomes.iter().any(|o| o.is_success()) {
                reload.reload();
            }
        });
    }

    /// Watch until the process exits.
    pub async fn run(self) -> anyhow::Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<DebounceEventResult>();

        let mut debouncer = new_debouncer(self.debounce, move |result: DebounceEventResult| {
            let _ = tx.send(result);
        })
        .context("Failed to create file watcher")?;

        debouncer
            .watcher()
            .watch(&self.root, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", self.root.display()))?;

        tracing::info!(
            "Watching {} ({} subscriptions)",
            self.root.display(),
            self.subscriptions.len()
        );

        while let Some(result) = rx.recv().await {
            match result {
                Ok(events) => {
                    let paths: Vec<PathBuf> = events.into_iter().map(|e| e.path).collect();
                    self.dispatch_and_reload(&paths);
                }
                Err(error) => {
                    tracing::warn!("Watch error: {:?}", error);
                }
            }
        }

        tracing::warn!("File watcher stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::runner::tests::counting_task;
    use crate::runner::TaskRunner;
    use crate::task::TaskRegistry;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn trigger_for(root: &Path, registry: TaskRegistry) -> WatchTrigger {
        let subscriptions = vec![
            WatchSubscription::new("styles/**/*.css", &["styles"]).unwrap(),
            WatchSubscription::new("scripts/**/*.js", &["scripts-main"]).unwrap(),
            WatchSubscription::new("scripts/vendors/**/*.js", &["scripts-deps"]).unwrap(),
        ];
        let runner = TaskRunner::new(Arc::new(registry), Arc::new(Config::new(root, root.join("build"))));
        WatchTrigger::new(root, subscriptions, Composer::new(runner))
    }

    #[tokio::test]
    async fn matching_tasks_dedupes_and_keeps_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        let trigger = trigger_for(temp.path(), TaskRegistry::new());
        let root = trigger.root().to_path_buf();

        let names = trigger.matching_tasks(&[
            root.join("scripts/vendors/jquery.js"),
            root.join("styles/a.css"),
            root.join("styles/b.css"),
            PathBuf::from("/elsewhere/styles/c.css"),
        ]);

        assert_eq!(names, vec!["styles", "scripts-main", "scripts-deps"]);
    }

    #[tokio::test]
    async fn one_batch_triggers_each_task_once() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runs = Arc::new(AtomicUsize::new(0));
        let mut registry = TaskRegistry::new();
        registry.register(counting_task("scripts-main", temp.path(), Arc::clone(&runs)));
        let trigger = trigger_for(temp.path(), registry);
        let root = trigger.root().to_path_buf();

        let handles = trigger.dispatch(&[
            root.join("scripts/index.js"),
            root.join("scripts/lib/util.js"),
            root.join("scripts/lib/dom.js"),
        ]);

        assert_eq!(handles.len(), 1);
        for handle in handles {
            assert!(handle.wait().await.is_success());
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unmatched_changes_trigger_nothing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let trigger = trigger_for(temp.path(), TaskRegistry::new());
        let root = trigger.root().to_path_buf();

        assert!(trigger.dispatch(&[root.join("README.md")]).is_empty());
    }

    #[tokio::test]
    async fn successful_dispatch_sends_reload() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runs = Arc::new(AtomicUsize::new(0));
        let mut registry = TaskRegistry::new();
        registry.register(counting_task("styles", temp.path(), Arc::clone(&runs)));
        let hub = ReloadHub::new();
        let mut rx = hub.subscribe();
        let trigger = trigger_for(temp.path(), registry).with_reload(hub);
        let root = trigger.root().to_path_buf();

        trigger.dispatch_and_reload(&[root.join("styles/main.css")]);

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("reload in time")
            .expect("reload event");
        assert_eq!(event.kind, "reload");
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
