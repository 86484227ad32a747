//! Process-wide configuration.
//!
//! Resolved exactly once at startup, before any task is registered, and then
//! shared read-only as `Arc<Config>`. Each setting is taken from the command
//! line first, then the environment, then the default:
//! - `--production` / `ASSETFLOW_PRODUCTION` - Enable minification. Defaults to `false`.
//! - `--proxy` / `ASSETFLOW_PROXY` - Reverse-proxy target for the live-reload server.
//! - `--initial-scripts` / `ASSETFLOW_INITIAL_SCRIPTS` - Bundle scripts on startup. Defaults to `true`.
//! - `--src` / `ASSETFLOW_SRC` - Source root. Defaults to `./src`.
//! - `--build` / `ASSETFLOW_BUILD` - Build root. Defaults to `./build`.
//! - `--host` / `ASSETFLOW_HOST` - Server host. Defaults to `127.0.0.1`.
//! - `--port` / `ASSETFLOW_PORT` - Server port. Defaults to `3000`.
//! - `--debounce-ms` / `ASSETFLOW_DEBOUNCE_MS` - Watch coalescing window. Defaults to `200`.
//! - `--toolchain` / `ASSETFLOW_TOOLCHAIN` - Tool command overrides. Defaults to `assetflow.json` if present.

use std::path::PathBuf;

use thiserror::Error;

use crate::cli::Cli;
use crate::paths::DirectoryMap;
use crate::util::{env_var_bool, env_var_opt, parse_bool};

pub const DEFAULT_TOOLCHAIN_FILE: &str = "assetflow.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("Cannot determine working directory: {0}")]
    WorkingDir(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Minify and pass production-only tool arguments
    pub production: bool,

    /// Reverse-proxy target; enables the live-reload server
    pub proxy: Option<String>,

    /// Bundle scripts on startup rather than on first change
    pub initial_scripts: bool,

    /// Working directory for external tools
    pub project_root: PathBuf,

    pub src_root: PathBuf,

    pub build_root: PathBuf,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Filesystem event coalescing window
    pub debounce_ms: u64,

    /// Optional tool command overrides
    pub toolchain_path: Option<PathBuf>,
}

impl Config {
    /// Resolve the configuration from parsed flags and the environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for unparsable numbers or an empty proxy.
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        let project_root = std::env::current_dir()?;

        let production = cli.production || env_var_bool("ASSETFLOW_PRODUCTION", false);

        let proxy = cli
            .proxy
            .clone()
            .or_else(|| env_var_opt("ASSETFLOW_PROXY"));
        if let Some(target) = &proxy {
            if target.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "proxy".to_string(),
                    "empty host".to_string(),
                ));
            }
        }

        let initial_scripts = match &cli.initial_scripts {
            Some(v) => parse_bool(v),
            None => env_var_bool("ASSETFLOW_INITIAL_SCRIPTS", true),
        };

        let src_root = cli
            .src_root
            .clone()
            .or_else(|| env_var_opt("ASSETFLOW_SRC").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("./src"));

        let build_root = cli
            .build_root
            .clone()
            .or_else(|| env_var_opt("ASSETFLOW_BUILD").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("./build"));

        let host = cli
            .host
            .clone()
            .or_else(|| env_var_opt("ASSETFLOW_HOST"))
            .unwrap_or_else(|| "127.0.0.1".to_string());

        let port = cli
            .port
            .clone()
            .or_else(|| env_var_opt("ASSETFLOW_PORT"))
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("port".to_string(), format!("{}", e)))?;

        let debounce_ms = cli
            .debounce_ms
            .clone()
            .or_else(|| env_var_opt("ASSETFLOW_DEBOUNCE_MS"))
            .unwrap_or_else(|| "200".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("debounce-ms".to_string(), format!("{}", e)))?;

        let toolchain_path = cli
            .toolchain
            .clone()
            .or_else(|| env_var_opt("ASSETFLOW_TOOLCHAIN").map(PathBuf::from))
            .or_else(|| {
                let default = project_root.join(DEFAULT_TOOLCHAIN_FILE);
                default.exists().then_some(default)
            });

        Ok(Self {
            production,
            proxy,
            initial_scripts,
            project_root,
            src_root,
            build_root,
            host,
            port,
            debounce_ms,
            toolchain_path,
        })
    }

    /// Create a config with custom roots (useful for testing).
    pub fn new(src_root: impl Into<PathBuf>, build_root: impl Into<PathBuf>) -> Self {
        Self {
            production: false,
            proxy: None,
            initial_scripts: true,
            project_root: PathBuf::from("."),
            src_root: src_root.into(),
            build_root: build_root.into(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            debounce_ms: 200,
            toolchain_path: None,
        }
    }

    pub fn with_production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    pub fn with_initial_scripts(mut self, initial_scripts: bool) -> Self {
        self.initial_scripts = initial_scripts;
        self
    }

    pub fn directories(&self) -> DirectoryMap {
        DirectoryMap::resolve(&self.src_root, &self.build_root)
    }

    /// `NODE_ENV` value handed to external tools.
    pub fn node_env(&self) -> &'static str {
        if self.production {
            "production"
        } else {
            "development"
        }
    }
}
