//! assetflow - CLI Entry Point
//!
//! Builds the asset tasks, then runs the requested subcommand.

use std::process::ExitCode;
use std::sync::Arc;

use assetflow::{App, Cli, Command, Config, RunSummary, Toolchain};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<ExitCode> {
    // Tasks only wait on I/O and subprocesses; one thread is enough.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async_main())
}

fn report(summary: &RunSummary) -> ExitCode {
    if summary.is_success() {
        info!("{} tasks finished", summary.succeeded);
        ExitCode::SUCCESS
    } else {
        if !summary.failed.is_empty() {
            let failed: Vec<String> = summary.failed.iter().map(ToString::to_string).collect();
            error!("Failed tasks: {}", failed.join(", "));
        }
        if !summary.rejected.is_empty() {
            error!("Unknown tasks: {}", summary.rejected.join(", "));
        }
        ExitCode::FAILURE
    }
}

async fn async_main() -> anyhow::Result<ExitCode> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "assetflow=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Arc::new(Config::resolve(&cli)?);
    info!(
        "Loaded configuration: src={} build={} production={} proxy={}",
        config.src_root.display(),
        config.build_root.display(),
        config.production,
        config.proxy.as_deref().unwrap_or("(none)")
    );

    let toolchain = Toolchain::load(config.toolchain_path.as_deref()).await?;
    let app = App::new(Arc::clone(&config), &toolchain)?;

    match cli.command() {
        Command::List => {
            for task in app.tasks() {
                println!("{:<24} {:<24} {}", task.name, task.label, task.stages.join(" | "));
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Build => Ok(report(&app.build().await)),
        Command::Run { tasks } => Ok(report(&app.run(tasks.into_iter().map(Some)).await)),
        Command::Live => {
            app.live().await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Watch => {
            app.watch().await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
