//! fanlog - log one message through a fully configured logger.

use anyhow::{Context, Result};
use clap::Parser;
use fanlog::{
    cli::Cli,
    config::{ConfigStore, GlobalOptions},
    factory::{LoggerFactory, LoggerOptions},
    logger::SinkErrorPolicy,
};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Internal diagnostics go to stderr so they never mix with the console sink.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let global = GlobalOptions::from_figment(GlobalOptions::figment(cli.config.as_deref()).merge(&cli))
        .context("Failed to load configuration")?;
    debug!(?global, "Loaded configuration");

    let policy = if cli.propagate_errors {
        SinkErrorPolicy::Propagate
    } else {
        SinkErrorPolicy::LogAndContinue
    };
    let mut options = LoggerOptions::default()
        .with_global(global)
        .with_sink_error_policy(policy);
    if let Some(label) = &cli.label {
        options = options.with_label(label.clone());
    }

    let logger = LoggerFactory::new(ConfigStore::global())
        .with_api_base(cli.api_base.clone())
        .create(options)
        .context("Failed to create logger")?;

    let mut failures = logger.subscribe_errors();
    logger.log(cli.level, cli.message.clone());
    if cli.simulate_panic {
        panic!("simulated panic after logging {:?}", cli.message);
    }
    logger.flush().await;

    let mut failed = false;
    while let Ok(failure) = failures.try_recv() {
        error!(sink = %failure.sink, error = %failure.error, "Delivery failed");
        failed = true;
    }
    if failed {
        std::process::exit(1);
    }

    Ok(())
}
