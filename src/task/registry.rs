use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{Task, TaskError};

/// A source file discovered for per-file task generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// File name, e.g. `main.css`.
    pub name: String,
    pub path: PathBuf,
}

/// Information about a task for display purposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    pub name: String,
    pub label: String,
    pub stages: Vec<String>,
}

/// List the regular files directly inside `dir`, sorted by name.
///
/// # Errors
///
/// Returns `TaskError::MissingSourceDir` if the directory cannot be read.
pub fn enumerate_sources(dir: &Path) -> Result<Vec<SourceFile>, TaskError> {
    let missing = |source| TaskError::MissingSourceDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(missing)? {
        let entry = entry.map_err(missing)?;
        if !entry.file_type().map_err(missing)?.is_file() {
            continue;
        }
        files.push(SourceFile {
            name: entry.file_name().to_string_lossy().to_string(),
            path: entry.path(),
        });
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

/// Registry of named tasks.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, Arc<Task>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a task, replacing any task already registered under its name.
    pub fn register(&mut self, task: Task) {
        if self.tasks.contains_key(&task.name) {
            tracing::debug!("Task '{}' re-registered, previous definition replaced", task.name);
        }
        self.tasks.insert(task.name.clone(), Arc::new(task));
    }

    /// Register one task per file in `source_dir`.
    ///
    /// Files are enumerated first (see [`enumerate_sources`]), then each
    /// `SourceFile` is turned into a task name by `name_fn` and into a task
    /// by `build_fn`. Returns the registered names in file-name order.
    ///
    /// # Errors
    ///
    /// A missing source directory fails the whole registration; callers treat
    /// it as fatal at startup. Errors from `build_fn` are propagated.
    pub fn register_for_each_file<N, B>(
        &mut self,
        source_dir: &Path,
        name_fn: N,
        build_fn: B,
    ) -> anyhow::Result<Vec<String>>
    where
        N: Fn(&SourceFile) -> String,
        B: Fn(&str, &SourceFile) -> anyhow::Result<Task>,
    {
        let files = enumerate_sources(source_dir)?;
        let mut names = Vec::with_capacity(files.len());
        for file in &files {
            let name = name_fn(file);
            let mut task = build_fn(&name, file)?;
            task.name = name.clone();
            self.register(task);
            names.push(name);
        }
        tracing::debug!(
            "Registered {} per-file tasks from {}",
            names.len(),
            source_dir.display()
        );
        Ok(names)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Task>> {
        self.tasks.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.tasks.keys().cloned().collect();
        names.sort();
        names
    }

    /// List all tasks, sorted by name.
    pub fn list(&self) -> Vec<TaskInfo> {
        let mut list: Vec<_> = self
            .tasks
            .values()
            .map(|t| TaskInfo {
                name: t.name.clone(),
                label: t.label.clone(),
                stages: t.pipeline.stage_names(),
            })
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }
}
