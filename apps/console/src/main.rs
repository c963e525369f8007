//! Runs the command pipeline against JSON-lines events on stdin and prints
//! every reply operation to stdout.

mod config;
mod demo;
mod io;

use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::Parser;
use commands::{AccessPolicy, CommandExecutor, Group, Pipeline, Services, TracingObserver};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::{
    config::load_settings,
    demo::StaticDirectory,
    io::{JsonTransport, StdinSource},
};

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "bot.toml")]
    config: PathBuf,
    /// Overrides the configured text prefix.
    #[arg(long)]
    prefix: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Stdout carries replies, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut settings = load_settings(&cli.config);
    if let Some(prefix) = cli.prefix {
        settings.executor.prefix = prefix;
    }
    info!(
        prefix = %settings.executor.prefix,
        owner_id = %settings.owner_id,
        max_attempts = settings.executor.retry.max_attempts,
        "starting command console"
    );

    let services = Services {
        resolver: Arc::new(StaticDirectory::new(settings.owner_id, settings.directory)),
        transport: Arc::new(JsonTransport::new(tokio::io::stdout())),
        access: Arc::new(AccessPolicy::Overridable(Group::bot_owner())),
    };
    let pipeline = Pipeline::new(Arc::new(demo::registry()), services, settings.executor)
        .with_observer(Arc::new(TracingObserver));
    let executor = CommandExecutor::new(pipeline, Arc::new(StdinSource));

    executor.start().await;
    tokio::select! {
        finished = executor.wait() => {
            if let Err(err) = finished {
                error!(error = %err, "command pipeline failed");
                return Err(err.into());
            }
            info!("input closed");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted");
            executor.stop().await;
        }
    }

    Ok(())
}
