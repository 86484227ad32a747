//! Command-line surface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Static-asset build orchestrator.
#[derive(Debug, Clone, Parser)]
#[command(name = "assetflow", version, about)]
pub struct Cli {
    /// Enable minification stages and production-only tool arguments
    #[arg(long, global = true)]
    pub production: bool,

    /// Start the live-reload server as a reverse proxy in front of HOST
    #[arg(long, value_name = "HOST", global = true)]
    pub proxy: Option<String>,

    /// Whether script bundling runs on startup (otherwise only on first change)
    #[arg(
        long,
        value_name = "BOOL",
        num_args = 0..=1,
        default_missing_value = "true",
        global = true
    )]
    pub initial_scripts: Option<String>,

    /// Source root
    #[arg(long = "src", value_name = "DIR", global = true)]
    pub src_root: Option<PathBuf>,

    /// Build root
    #[arg(long = "build", value_name = "DIR", global = true)]
    pub build_root: Option<PathBuf>,

    /// Live-reload server host
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Live-reload server port
    #[arg(long, global = true)]
    pub port: Option<String>,

    /// Coalescing window for filesystem events, in milliseconds
    #[arg(long, value_name = "MS", global = true)]
    pub debounce_ms: Option<String>,

    /// JSON file overriding the external tool commands
    #[arg(long, value_name = "FILE", global = true)]
    pub toolchain: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Run every asset task once
    Build,
    /// Run every asset task once, then watch (default)
    Live,
    /// Watch only
    Watch,
    /// Run the named tasks once
    Run {
        #[arg(required = true)]
        tasks: Vec<String>,
    },
    /// List registered tasks
    List,
}

impl Cli {
    /// The subcommand, with `live` as the default.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Live)
    }
}
