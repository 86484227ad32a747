//! Wiring for the subcommands.

use std::sync::Arc;
use std::time::Duration;

use crate::assets::{watch_subscriptions, AssetTasks};
use crate::composer::Composer;
use crate::config::Config;
use crate::gate::Gate;
use crate::runner::{InvocationOutcome, TaskRunner};
use crate::server::{self, ReloadHub};
use crate::task::{TaskInfo, TaskRegistry};
use crate::toolchain::Toolchain;
use crate::watch::WatchTrigger;

/// A task whose invocation failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedTask {
    pub task: String,
    pub label: String,
}

impl std::fmt::Display for FailedTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.label, self.task)
    }
}

/// Result of a one-shot run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: Vec<FailedTask>,
    pub rejected: Vec<String>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.rejected.is_empty()
    }
}

pub struct App {
    config: Arc<Config>,
    gate: Gate,
    composer: Composer,
    default_tasks: Vec<Option<String>>,
}

impl App {
    /// Register the asset tasks. A missing styles directory is fatal here.
    pub fn new(config: Arc<Config>, toolchain: &Toolchain) -> anyhow::Result<Self> {
        let gate = Gate::new(Arc::clone(&config));
        let assets = AssetTasks::new(toolchain, &gate);

        let mut registry = TaskRegistry::new();
        assets.register(&mut registry)?;
        let default_tasks = assets.default_tasks();

        let runner = TaskRunner::new(Arc::new(registry), Arc::clone(&config));
        Ok(Self {
            config,
            gate,
            composer: Composer::new(runner),
            default_tasks,
        })
    }

    pub fn tasks(&self) -> Vec<TaskInfo> {
        self.composer.runner().registry().list()
    }

    pub fn default_tasks(&self) -> &[Option<String>] {
        &self.default_tasks
    }

    /// Run the default task list once and wait for it.
    pub async fn build(&self) -> RunSummary {
        self.run(self.default_tasks.clone()).await
    }

    /// Run `names` once and wait for them.
    pub async fn run<I>(&self, names: I) -> RunSummary
    where
        I: IntoIterator<Item = Option<String>>,
    {
        let launch = self.composer.run(names);
        let mut summary = RunSummary {
            rejected: launch.rejected.clone(),
            ..Default::default()
        };
        for outcome in launch.wait_all().await {
            match outcome {
                InvocationOutcome::Succeeded(_) => summary.succeeded += 1,
                InvocationOutcome::Failed { task, label, .. } => {
                    summary.failed.push(FailedTask { task, label })
                }
            }
        }
        summary
    }

    /// Start the default task list and watch at the same time.
    pub async fn live(self) -> anyhow::Result<()> {
        let launch = self.composer.run(self.default_tasks.clone());
        tokio::spawn(async move {
            let failed: Vec<String> = launch
                .wait_all()
                .await
                .into_iter()
                .filter_map(|outcome| match outcome {
                    InvocationOutcome::Failed { label, .. } => Some(label),
                    InvocationOutcome::Succeeded(_) => None,
                })
                .collect();
            if !failed.is_empty() {
                tracing::warn!("Startup failed for {}; watching anyway", failed.join(", "));
            }
        });
        self.watch().await
    }

    /// Watch the source root, with the live-reload server when a proxy is set.
    ///
    /// Runs until the watcher or the server stops.
    pub async fn watch(self) -> anyhow::Result<()> {
        let mut trigger = WatchTrigger::new(
            &self.config.src_root,
            watch_subscriptions()?,
            self.composer.clone(),
        )
        .with_debounce(Duration::from_millis(self.config.debounce_ms));

        let Some(target) = self.gate.proxy().map(str::to_string) else {
            return trigger.run().await;
        };

        let reload = ReloadHub::new();
        trigger = trigger.with_reload(reload.clone());
        let config = Arc::clone(&self.config);

        tokio::select! {
            result = trigger.run() => result,
            result = server::serve(config, reload, &target) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn project(root: &Path) {
        std::fs::create_dir_all(root.join("src/styles")).unwrap();
        std::fs::create_dir_all(root.join("src/fonts")).unwrap();
        std::fs::write(root.join("src/fonts/a.woff"), "font").unwrap();
    }

    #[test]
    fn missing_styles_directory_fails_startup() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = Arc::new(Config::new(temp.path().join("src"), temp.path().join("build")));

        assert!(App::new(config, &Toolchain::default()).is_err());
    }

    #[tokio::test]
    async fn run_reports_unknown_names_without_stopping_others() {
        let temp = tempfile::tempdir().expect("tempdir");
        project(temp.path());
        let config = Arc::new(Config::new(temp.path().join("src"), temp.path().join("build")));
        let app = App::new(config, &Toolchain::default()).unwrap();

        let summary = app
            .run(vec![Some("nope".to_string()), Some("fonts".to_string()), None])
            .await;

        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.rejected, vec!["nope".to_string()]);
        assert!(!summary.is_success());
        assert!(temp.path().join("build/fonts/a.woff").exists());
    }

    #[test]
    fn lists_registered_tasks() {
        let temp = tempfile::tempdir().expect("tempdir");
        project(temp.path());
        let config = Arc::new(Config::new(temp.path().join("src"), temp.path().join("build")));
        let app = App::new(config, &Toolchain::default()).unwrap();

        let names: Vec<String> = app.tasks().into_iter().map(|t| t.name).collect();
        assert!(names.contains(&"scripts-main".to_string()));
        assert_eq!(app.default_tasks().len(), 8);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failures_carry_the_task_label() {
        let temp = tempfile::tempdir().expect("tempdir");
        project(temp.path());
        std::fs::create_dir_all(temp.path().join("src/images")).unwrap();
        std::fs::write(temp.path().join("src/images/logo.png"), [0u8; 4]).unwrap();
        let toolchain = Toolchain {
            image_optimizer: crate::toolchain::ToolCommand::new("false", &[]),
            ..Toolchain::default()
        };
        let config = Arc::new(Config::new(temp.path().join("src"), temp.path().join("build")));
        let app = App::new(config, &toolchain).unwrap();

        let summary = app.run(vec![Some("opt-images".to_string())]).await;

        assert_eq!(
            summary.failed,
            vec![FailedTask {
                task: "opt-images".to_string(),
                label: "Opt images".to_string(),
            }]
        );
        assert_eq!(summary.failed[0].to_string(), "Opt images (opt-images)");
        assert!(!temp.path().join("build/img/logo.png").exists());
    }
}
