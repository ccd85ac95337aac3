//! Slack API client module
//!
//! Implements [`ChatPlatform`] on top of the Slack Web API. Read calls retry
//! with backoff; posting is a single attempt so a failed chunk is never
//! delivered twice by this layer.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::{Value, json};
use slack_morphism::errors::SlackClientError;
use slack_morphism::hyper_tokio::{SlackClientHyperConnector, SlackHyperClient};
use slack_morphism::prelude::{
    SlackApiChatPostMessageRequest, SlackApiConversationsHistoryRequest,
};
use slack_morphism::{
    SlackApiToken, SlackApiTokenValue, SlackChannelId, SlackMessageContent, SlackTs,
};
use std::time::Duration;
use tokio_retry::strategy::jitter;
use tokio_retry::{Retry, strategy::ExponentialBackoff};
use tracing::{debug, info, warn};

use crate::core::models::MessageId;
use crate::errors::DigestError;
use crate::platform::{ChannelEntity, ChatPlatform, PlatformMessage, oldest_unseen};
use crate::slack::history::{HistoryPage, HistoryWindow, PAGE_LIMIT, scan_forward};

// Build the Slack client connector safely without panicking.
// If connector construction fails, store None and surface a DigestError at call sites.
static SLACK_CLIENT: std::sync::LazyLock<Option<SlackHyperClient>> =
    std::sync::LazyLock::new(|| match SlackClientHyperConnector::new() {
        Ok(connector) => Some(SlackHyperClient::new(connector)),
        Err(e) => {
            warn!("Failed to create Slack HTTP connector: {}", e);
            None
        }
    });

static HTTP_CLIENT: std::sync::LazyLock<Client> = std::sync::LazyLock::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_else(|_| Client::new())
});

/// Slack error codes that mean the token itself is unusable.
const AUTH_ERROR_CODES: &[&str] = &[
    "not_authed",
    "invalid_auth",
    "account_inactive",
    "token_revoked",
    "token_expired",
];

/// Converts a Slack message timestamp (`"1700000000.000100"`) to an integer
/// message id in microseconds. Slack timestamps are unique per channel and
/// increase with posting order, which is all a cursor needs.
#[must_use]
pub fn ts_to_message_id(ts: &str) -> Option<MessageId> {
    let (secs, frac) = ts.split_once('.').unwrap_or((ts, ""));
    if secs.is_empty() || !secs.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if frac.len() > 6 || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let secs: MessageId = secs.parse().ok()?;
    let micros: MessageId = if frac.is_empty() {
        0
    } else {
        format!("{frac:0<6}").parse().ok()?
    };
    secs.checked_mul(1_000_000)?.checked_add(micros)
}

/// Inverse of [`ts_to_message_id`].
#[must_use]
pub fn message_id_to_ts(id: MessageId) -> String {
    format!("{}.{:06}", id / 1_000_000, id % 1_000_000)
}

/// Slack API client with retry logic and error handling
pub struct SlackClient {
    token: SlackApiToken,
}

impl SlackClient {
    #[must_use]
    pub fn new(token: String) -> Self {
        Self {
            token: SlackApiToken::new(SlackApiTokenValue::new(token)),
        }
    }

    async fn with_retry<F, Fut, T>(&self, operation: F) -> Result<T, DigestError>
    where
        F: FnMut() -> Fut + Send,
        Fut: std::future::Future<Output = Result<T, DigestError>> + Send,
        T: Send,
    {
        let strategy = ExponentialBackoff::from_millis(100).map(jitter).take(3);

        Retry::spawn(strategy, operation).await
    }

    fn session_client() -> Result<&'static SlackHyperClient, DigestError> {
        SLACK_CLIENT.as_ref().ok_or_else(|| {
            DigestError::ApiError("Slack HTTP connector not initialized".to_string())
        })
    }

    /// Calls a read-only Web API method through the raw HTTP client and checks
    /// Slack's `ok` flag. Read methods take form-encoded arguments.
    async fn call_api(&self, method: &str, payload: &Value) -> Result<Value, DigestError> {
        let resp = HTTP_CLIENT
            .post(format!("https://slack.com/api/{method}"))
            .bearer_auth(&self.token.token_value.0)
            .form(payload)
            .send()
            .await
            .map_err(|e| DigestError::HttpError(format!("{method} request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(DigestError::ApiError(format!(
                "{method} HTTP error: {}",
                resp.status()
            )));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| DigestError::ApiError(format!("{method} JSON parse error: {e}")))?;

        if !body.get("ok").and_then(Value::as_bool).unwrap_or(false) {
            return Err(DigestError::ApiError(format!(
                "{method} error: {}",
                body.get("error").and_then(Value::as_str).unwrap_or("unknown")
            )));
        }

        Ok(body)
    }

    /// # Errors
    ///
    /// Returns an error if the Slack API request fails or the channel is unknown.
    pub async fn get_channel_info(&self, channel_id: &str) -> Result<ChannelEntity, DigestError> {
        self.with_retry(|| async {
            let body = self
                .call_api("conversations.info", &json!({ "channel": channel_id }))
                .await?;
            let channel = body.get("channel").ok_or_else(|| {
                DigestError::ApiError("conversations.info returned no channel".to_string())
            })?;
            Ok(channel_entity_from_json(channel, channel_id))
        })
        .await
    }

    /// Walks `conversations.list` until a channel named `name` (without `#`)
    /// turns up.
    ///
    /// # Errors
    ///
    /// Returns an error if a page request fails or no channel has that name.
    pub async fn find_channel_by_name(&self, name: &str) -> Result<ChannelEntity, DigestError> {
        let mut cursor: Option<String> = None;
        loop {
            let mut payload = json!({
                "limit": PAGE_LIMIT,
                "exclude_archived": true,
                "types": "public_channel,private_channel",
            });
            if let Some(c) = &cursor {
                payload["cursor"] = Value::String(c.clone());
            }

            let body = self
                .with_retry(|| async { self.call_api("conversations.list", &payload).await })
                .await?;

            if let Some(channels) = body.get("channels").and_then(Value::as_array) {
                if let Some(found) = channels
                    .iter()
                    .find(|c| c.get("name").and_then(Value::as_str) == Some(name))
                {
                    return Ok(channel_entity_from_json(found, name));
                }
            }

            cursor = body
                .get("response_metadata")
                .and_then(|m| m.get("next_cursor"))
                .and_then(Value::as_str)
                .filter(|c| !c.is_empty())
                .map(str::to_string);
            if cursor.is_none() {
                return Err(DigestError::ApiError(format!("channel #{name} not found")));
            }
        }
    }

    /// One `conversations.history` page for `window`, newest first. Slack
    /// treats both bounds as exclusive, so `latest` sits one tick past
    /// `until`.
    async fn history_page(
        &self,
        channel: &SlackChannelId,
        window: HistoryWindow,
    ) -> Result<HistoryPage, DigestError> {
        let session_client = Self::session_client()?;
        let page = self
            .with_retry(|| {
                let mut request = SlackApiConversationsHistoryRequest::new()
                    .with_channel(channel.clone())
                    .with_limit(PAGE_LIMIT);
                if window.after > 0 {
                    request = request.with_oldest(SlackTs(message_id_to_ts(window.after)));
                }
                if let Some(until) = window.until {
                    let latest = message_id_to_ts(until.saturating_add(1));
                    request = request.with_latest(SlackTs(latest));
                }
                async move {
                    let session = session_client.open_session(&self.token);
                    session
                        .conversations_history(&request)
                        .await
                        .map_err(DigestError::from)
                }
            })
            .await?;

        let has_more = page
            .response_metadata
            .and_then(|m| m.next_cursor)
            .is_some_and(|c| !c.0.is_empty());
        let messages = page
            .messages
            .into_iter()
            .filter_map(|msg| {
                let Some(id) = ts_to_message_id(&msg.origin.ts.0) else {
                    warn!("Skipping message with unparseable ts {}", msg.origin.ts.0);
                    return None;
                };
                Some(PlatformMessage {
                    id,
                    text: msg.content.text,
                })
            })
            .collect();

        Ok(HistoryPage { messages, has_more })
    }
}

fn channel_entity_from_json(channel: &Value, fallback_id: &str) -> ChannelEntity {
    ChannelEntity {
        id: channel
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or(fallback_id)
            .to_string(),
        name: channel
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string),
        created: channel
            .get("created")
            .and_then(Value::as_u64)
            .and_then(|secs| secs.checked_mul(1_000_000)),
    }
}

/// Where a history scan starts: the cursor, or for a channel never read
/// before, just ahead of its creation.
fn scan_start(entity: &ChannelEntity, min_id: MessageId) -> MessageId {
    if min_id > 0 {
        return min_id;
    }
    entity
        .created
        .map_or(0, |created| created.saturating_sub(1))
}

fn now_id() -> MessageId {
    MessageId::try_from(Utc::now().timestamp_micros()).unwrap_or(MessageId::MAX)
}

#[async_trait]
impl ChatPlatform for SlackClient {
    async fn is_authorized(&self) -> Result<bool, DigestError> {
        let session_client = Self::session_client()?;
        let session = session_client.open_session(&self.token);
        match session.auth_test().await {
            Ok(resp) => {
                info!("Authorized as Slack user {}", resp.user_id.0);
                Ok(true)
            }
            Err(SlackClientError::ApiError(ref api_err))
                if AUTH_ERROR_CODES.contains(&api_err.code.as_str()) =>
            {
                warn!("Slack token rejected: {}", api_err.code);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_entity(&self, identifier: &str) -> Result<ChannelEntity, DigestError> {
        match identifier.strip_prefix('#') {
            Some(name) => self.find_channel_by_name(name).await,
            None => self.get_channel_info(identifier).await,
        }
    }

    async fn iter_messages(
        &self,
        entity: &ChannelEntity,
        min_id: MessageId,
        limit: u32,
    ) -> Result<Vec<PlatformMessage>, DigestError> {
        let channel = SlackChannelId(entity.id.clone());
        let channel = &channel;
        let start = scan_start(entity, min_id);
        let messages = scan_forward(start, limit, now_id(), move |window| {
            self.history_page(channel, window)
        })
        .await?;
        let messages = oldest_unseen(messages, min_id, limit);
        debug!(
            "Channel {} returned {} messages after {}",
            entity.id,
            messages.len(),
            min_id
        );
        Ok(messages)
    }

    async fn send_message(&self, entity: &ChannelEntity, text: &str) -> Result<(), DigestError> {
        let session_client = Self::session_client()?;
        let session = session_client.open_session(&self.token);

        let post_req = SlackApiChatPostMessageRequest::new(
            SlackChannelId(entity.id.clone()),
            SlackMessageContent::new().with_text(text.to_string()),
        );

        session.chat_post_message(&post_req).await?;

        Ok(())
    }
}
