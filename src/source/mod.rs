//! Channel sources: where unseen messages come from
//!
//! The aggregator only knows the [`ChannelSource`] capability. The shipped
//! [`PlatformSource`] serves any channel reachable through a
//! [`ChatPlatform`]; other feeds implement the same trait.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::core::models::{FetchResult, FetchedMessage, MessageId};
use crate::errors::DigestError;
use crate::platform::{ChatPlatform, PlatformMessage, oldest_unseen};
use crate::utils::with_timeout;

#[async_trait]
pub trait ChannelSource: Send + Sync {
    /// Messages newer than `cursor` for `channel_id`, at most `fetch_limit`
    /// of them, plus the cursor to store afterwards.
    ///
    /// # Errors
    ///
    /// Returns `ChannelFetchError` when the channel cannot be read.
    async fn fetch(
        &self,
        channel_id: &str,
        cursor: MessageId,
        fetch_limit: u32,
    ) -> Result<FetchResult, DigestError>;
}

/// Reads channels through a chat platform client.
pub struct PlatformSource {
    platform: Arc<dyn ChatPlatform>,
    call_timeout: Duration,
}

impl PlatformSource {
    #[must_use]
    pub fn new(platform: Arc<dyn ChatPlatform>, call_timeout: Duration) -> Self {
        Self {
            platform,
            call_timeout,
        }
    }
}

#[async_trait]
impl ChannelSource for PlatformSource {
    async fn fetch(
        &self,
        channel_id: &str,
        cursor: MessageId,
        fetch_limit: u32,
    ) -> Result<FetchResult, DigestError> {
        debug!(
            "Fetching messages for channel {} starting after message ID {}",
            channel_id, cursor
        );

        let entity = with_timeout(
            self.call_timeout,
            "resolve channel",
            self.platform.get_entity(channel_id),
        )
        .await
        .map_err(|e| e.into_channel_fetch(channel_id))?;

        let raw = with_timeout(
            self.call_timeout,
            "fetch history",
            self.platform.iter_messages(&entity, cursor, fetch_limit),
        )
        .await
        .map_err(|e| e.into_channel_fetch(channel_id))?;

        Ok(collect_fetch(channel_id, cursor, fetch_limit, raw))
    }
}

/// Turns raw platform messages into a [`FetchResult`].
///
/// Keeps only ids above `cursor`, the oldest `fetch_limit` of them, in
/// ascending order. Messages without text are left out of the result but
/// still move the cursor, so they are never fetched again. Whitespace-only
/// text is still text and is kept.
#[must_use]
pub fn collect_fetch(
    channel_id: &str,
    cursor: MessageId,
    fetch_limit: u32,
    raw: Vec<PlatformMessage>,
) -> FetchResult {
    let fresh = oldest_unseen(raw, cursor, fetch_limit);

    let new_cursor = fresh.last().map_or(cursor, |m| m.id);
    let messages = fresh
        .into_iter()
        .filter_map(|m| {
            let text = m.text.filter(|t| !t.is_empty())?;
            Some(FetchedMessage::new(text, channel_id, m.id))
        })
        .collect();

    FetchResult {
        messages,
        new_cursor,
    }
}
