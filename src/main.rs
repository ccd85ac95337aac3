use std::process::ExitCode;

use anyhow::{Context, Result};
use channel_digest::core::config::AppConfig;
use channel_digest::setup_logging;
use channel_digest::worker::build_driver;
use tracing::{error, info};

// One digest run per invocation; schedule it with cron or a systemd timer.
#[tokio::main]
async fn main() -> Result<ExitCode> {
    setup_logging();

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    info!(
        "Starting digest run for {} channels, output {}",
        config.channels.len(),
        config.output_channel
    );

    let driver = build_driver(&config)
        .await
        .context("Failed to initialize pipeline")?;
    let report = driver.run().await;

    println!("{}", serde_json::to_string(&report)?);

    if report.is_fatal() {
        error!("Digest run {} failed", report.run_id);
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
