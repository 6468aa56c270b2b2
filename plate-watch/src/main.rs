//! plate-watch - Follow section image generation from the command line
//!
//! Prints one line per progress snapshot. Exit status 0 once the terminal
//! snapshot arrived, 2 when the stream broke off first.

use anyhow::Result;
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use plate_watch::{subscribe, ConsumerOutcome, ProgressConsumer};

const EXIT_UNKNOWN_OUTCOME: u8 = 2;

/// Follow section image generation progress for one artifact
#[derive(Debug, Parser)]
#[command(name = "plate-watch", version, about)]
struct Args {
    /// Artifact whose generation job to follow
    artifact_id: Uuid,

    /// plate-gen base URL
    #[arg(long, env = "PLATE_URL", default_value = "http://127.0.0.1:5740")]
    url: String,

    /// Pause before reporting completion, overrides the config file
    #[arg(long)]
    grace_ms: Option<u64>,

    /// Path to plate.toml
    #[arg(long, env = "PLATE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let config = plate_common::config::load_config(args.config.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let grace_period = Duration::from_millis(
        args.grace_ms
            .unwrap_or(config.generation.grace_period_ms),
    );

    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()?;

    info!(artifact_id = %args.artifact_id, url = %args.url, "Watching generation progress");

    let stream = subscribe(&client, &args.url, args.artifact_id);
    let mut consumer = ProgressConsumer::new(grace_period);

    let outcome = consumer
        .run(
            stream,
            |display| {
                let stage = display.stage.map(|s| s.as_str()).unwrap_or("-");
                println!(
                    "[{:>3}%] {}/{} {}: {}",
                    display.percentage, display.current, display.total, stage, display.message
                );
                let _ = std::io::stdout().flush();
            },
            |terminal| {
                println!("Done: {}", terminal.message);
            },
        )
        .await;

    match outcome {
        ConsumerOutcome::Completed(_) => Ok(ExitCode::SUCCESS),
        ConsumerOutcome::Unknown => {
            eprintln!("Progress stream ended before generation finished; outcome unknown");
            Ok(ExitCode::from(EXIT_UNKNOWN_OUTCOME))
        }
        ConsumerOutcome::TransportFailed(e) => {
            eprintln!("Progress stream failed ({}); outcome unknown", e);
            Ok(ExitCode::from(EXIT_UNKNOWN_OUTCOME))
        }
    }
}
