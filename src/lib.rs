/// Channel Digest - periodically summarizes new messages from a set of chat
/// channels and posts the summary to an output channel.
///
/// Every run goes through three stages:
/// 1. Aggregation reads each channel after its stored cursor and commits the
///    new cursor as soon as that channel's fetch succeeds
/// 2. Summarization turns the combined batch into one digest with a single
///    language-model call
/// 3. Publishing splits the digest into size-limited chunks and posts them in
///    order
///
/// # Architecture
///
/// The system uses:
/// - slack-morphism for the Slack Web API
/// - openai-api-rs message types sent to the OpenAI Responses API
/// - SQLite (rusqlite) or AWS SSM Parameter Store for cursors
/// - AWS Lambda for scheduled execution, or the `digest-run` binary under cron
/// - Tokio for async runtime
///
/// # Example
///
/// ```no_run
/// use channel_digest::core::config::AppConfig;
/// use channel_digest::worker::build_driver;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     channel_digest::setup_logging();
///
///     let config = AppConfig::from_env()?;
///     let driver = build_driver(&config).await?;
///     let report = driver.run().await;
///     println!("{}", serde_json::to_string_pretty(&report)?);
///     Ok(())
/// }
/// ```
pub mod ai;
pub mod core;
pub mod cursor;
pub mod errors;
pub mod platform;
pub mod slack;
pub mod source;
pub mod utils;
pub mod worker;

pub use errors::DigestError;
pub use worker::{PipelineDriver, RunOutcome, RunReport};

/// Configure structured JSON logging.
///
/// The filter comes from `RUST_LOG` and defaults to `info` (`debug` with the
/// `debug-logs` feature). Calling this more than once is harmless; only the
/// first call installs a subscriber.
///
/// # Example
///
/// ```
/// channel_digest::setup_logging();
/// ```
pub fn setup_logging() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::prelude::*;

    let default_level = if cfg!(feature = "debug-logs") {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let fmt_layer = tracing_subscriber::fmt::layer().json().with_target(true);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
