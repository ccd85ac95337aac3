use async_trait::async_trait;
use aws_sdk_ssm::{Client as SsmClient, types::ParameterType};
use tracing::debug;

use super::CursorStore;
use crate::core::models::MessageId;
use crate::errors::DigestError;

/// Cursor store that keeps one SSM `String` parameter per channel under a
/// common prefix. Fits the Lambda deployment, where there is no local disk
/// that outlives an invocation.
pub struct SsmCursorStore {
    client: SsmClient,
    prefix: String,
}

impl SsmCursorStore {
    pub async fn from_env(prefix: &str) -> Self {
        let shared = aws_config::from_env().load().await;
        Self::new(SsmClient::new(&shared), prefix)
    }

    #[must_use]
    pub fn new(client: SsmClient, prefix: &str) -> Self {
        Self {
            client,
            prefix: prefix.to_string(),
        }
    }

    fn key_for_channel(&self, channel_id: &str) -> String {
        parameter_name(&self.prefix, channel_id)
    }
}

/// Parameter names only allow `[a-zA-Z0-9_.\-/]`, so a leading `#` on a
/// channel name is dropped.
#[must_use]
pub fn parameter_name(prefix: &str, channel_id: &str) -> String {
    let mut p = prefix.to_string();
    if !p.ends_with('/') {
        p.push('/');
    }
    let channel = channel_id.trim_start_matches('#');
    format!("{p}{channel}")
}

#[async_trait]
impl CursorStore for SsmCursorStore {
    async fn get(&self, channel_id: &str) -> Result<MessageId, DigestError> {
        let name = self.key_for_channel(channel_id);

        match self.client.get_parameter().name(&name).send().await {
            Ok(resp) => {
                let Some(value) = resp.parameter.as_ref().and_then(|p| p.value()) else {
                    return Ok(0);
                };
                value.trim().parse::<MessageId>().map_err(|e| {
                    DigestError::CursorStoreError(format!(
                        "ssm parameter {name} holds '{value}': {e}"
                    ))
                })
            }
            Err(e) => {
                let not_found = e
                    .as_service_error()
                    .is_some_and(|se| se.is_parameter_not_found());
                if not_found {
                    debug!("No cursor parameter {} yet", name);
                    Ok(0)
                } else {
                    Err(DigestError::CursorStoreError(format!(
                        "ssm get_parameter {name}: {}",
                        aws_sdk_ssm::error::DisplayErrorContext(&e)
                    )))
                }
            }
        }
    }

    async fn set(&self, channel_id: &str, message_id: MessageId) -> Result<(), DigestError> {
        let name = self.key_for_channel(channel_id);

        self.client
            .put_parameter()
            .name(&name)
            .value(message_id.to_string())
            .r#type(ParameterType::String)
            .overwrite(true)
            .send()
            .await
            .map_err(|e| {
                DigestError::CursorStoreError(format!(
                    "ssm put_parameter {name}: {}",
                    aws_sdk_ssm::error::DisplayErrorContext(&e)
                ))
            })?;

        debug!("Saved last message ID {} to {}", message_id, name);
        Ok(())
    }
}
