use std::sync::Arc;

use lambda_runtime::{Error, LambdaEvent};
use serde_json::Value;
use tracing::{error, info};

use super::pipeline::PipelineDriver;
use crate::ai::{LanguageModel, LlmClient};
use crate::core::config::AppConfig;
use crate::cursor::open_store;
use crate::errors::DigestError;
use crate::platform::ChatPlatform;
use crate::slack::SlackClient;

/// Builds the production pipeline: Slack for reading and publishing, the
/// OpenAI Responses API for summarizing and the configured cursor store.
///
/// # Errors
///
/// Returns an error when the model client or the cursor store cannot be
/// created.
pub async fn build_driver(config: &AppConfig) -> Result<PipelineDriver, DigestError> {
    let platform: Arc<dyn ChatPlatform> = Arc::new(SlackClient::new(config.slack_bot_token.clone()));
    let model: Arc<dyn LanguageModel> = Arc::new(LlmClient::new(
        config.openai_api_key.clone(),
        config.openai_org_id.clone(),
        config.openai_model.clone(),
        Some(config.openai_temperature),
        config.call_timeout,
    )?);
    let store = open_store(&config.cursor_store).await?;

    Ok(PipelineDriver::from_config(config, platform, model, store))
}

/// Lambda handler for a scheduled digest run. The event payload is ignored;
/// each invocation is one full pass over the configured channels.
pub async fn function_handler(event: LambdaEvent<Value>) -> Result<Value, Error> {
    info!(
        request_id = %event.context.request_id,
        "Digest worker invoked"
    );

    let config = AppConfig::from_env().map_err(|e| {
        error!("Config error: {}", e);
        Error::from(e)
    })?;

    let driver = build_driver(&config).await.map_err(|e| {
        error!("Failed to initialize pipeline: {}", e);
        Error::from(e)
    })?;

    let report = driver.run().await;
    let body = serde_json::to_value(&report)
        .map_err(|e| Error::from(format!("Failed to serialize run report: {e}")))?;

    if report.is_fatal() {
        return Err(Error::from(format!(
            "Digest run {} failed: {}",
            report.run_id, body
        )));
    }
    Ok(body)
}
