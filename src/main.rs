use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

use eventsieve::clock::SystemClock;
use eventsieve::config::{EventsieveConfig, LogConfig};
use eventsieve::runner::Runner;

/// Write-policy plugin: reads inputs from stdin, writes decisions to stdout.
#[derive(Debug, Parser)]
#[command(name = "eventsieve", version, about)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "eventsieve.yaml")]
    config: PathBuf,

    /// Log filter, overriding the configured level
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = EventsieveConfig::from_file(&args.config)?;

    if let Some(level) = args.log_level {
        config.log.level = level;
    }
    if args.json_logs {
        config.log.json = true;
    }
    init_tracing(&config.log);

    info!("Starting eventsieve");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let options = config.limiter.options(Arc::new(SystemClock::new()));
    let sifter = config.policy.build(&options)?;
    info!(policy = ?config.policy.kind, "Policy loaded");

    // stdout carries decisions only
    Runner::new(sifter)
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await?;

    info!("Eventsieve stopped");
    Ok(())
}

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
