//! # assetflow
//!
//! Static-asset build orchestrator for web projects.
//!
//! This library provides:
//! - Named asset tasks, each a source set piped through transformation stages
//!   into a build directory
//! - A runner that serializes invocations per task and coalesces re-triggers
//! - A file watcher that maps changed paths to tasks
//! - A live-reload server that proxies a development site
//!
//! ## Task Flow
//! 1. Read the task's source files into a [`batch::FileBatch`]
//! 2. Pipe the batch through its stages (external tools, concat, rename)
//! 3. Write the result to the destination, only if every stage succeeded
//! 4. Tell connected browsers to reload (watch mode)
//!
//! ## Modules
//! - `assets`: The project's concrete tasks and watch subscriptions
//! - `task`: Task definitions and the registry
//! - `runner` / `composer`: Invocation, coalescing and task lists
//! - `watch`: Filesystem watching
//! - `server`: Live-reload proxy

pub mod app;
pub mod assets;
pub mod batch;
pub mod cli;
pub mod composer;
pub mod config;
pub mod gate;
pub mod glob;
pub mod paths;
pub mod pipeline;
pub mod runner;
pub mod server;
pub mod stages;
pub mod task;
pub mod toolchain;
pub mod util;
pub mod watch;

pub use app::{App, FailedTask, RunSummary};
pub use cli::{Cli, Command};
pub use config::Config;
pub use task::{Task, TaskRegistry};
pub use toolchain::Toolchain;
