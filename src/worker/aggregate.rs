use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::core::models::{Batch, FetchedMessage, MessageId};
use crate::cursor::CursorStore;
use crate::errors::DigestError;
use crate::source::ChannelSource;
use crate::utils::with_timeout;

/// A configured channel and the source that serves it.
#[derive(Clone)]
pub struct SourceChannel {
    pub channel_id: String,
    pub source: Arc<dyn ChannelSource>,
}

impl SourceChannel {
    pub fn new(channel_id: impl Into<String>, source: Arc<dyn ChannelSource>) -> Self {
        Self {
            channel_id: channel_id.into(),
            source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChannelOutcome {
    Fetched {
        messages: usize,
        previous_cursor: MessageId,
        new_cursor: MessageId,
    },
    FetchFailed {
        error: String,
    },
    CursorStoreFailed {
        error: String,
    },
}

impl ChannelOutcome {
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        !matches!(self, Self::Fetched { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelReport {
    pub channel_id: String,
    #[serde(flatten)]
    pub outcome: ChannelOutcome,
}

/// Everything one aggregation pass produced.
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub batch: Batch,
    pub reports: Vec<ChannelReport>,
}

/// Fans out to every configured channel and commits each channel's cursor
/// as soon as that channel's own fetch has succeeded.
pub struct Aggregator {
    store: Arc<dyn CursorStore>,
    channels: Vec<SourceChannel>,
    fetch_limit: u32,
    call_timeout: Duration,
}

impl Aggregator {
    #[must_use]
    pub fn new(
        store: Arc<dyn CursorStore>,
        channels: Vec<SourceChannel>,
        fetch_limit: u32,
        call_timeout: Duration,
    ) -> Self {
        Self {
            store,
            channels,
            fetch_limit,
            call_timeout,
        }
    }

    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Fetches every channel concurrently, then assembles the batch in
    /// configuration order. A failing channel contributes nothing and keeps
    /// its stored cursor; the others are unaffected.
    pub async fn fetch_all(&self) -> Aggregation {
        let fetches = self.channels.iter().map(|ch| self.fetch_channel(ch));
        let results = join_all(fetches).await;

        let mut aggregation = Aggregation::default();
        for (ch, result) in self.channels.iter().zip(results) {
            let outcome = match result {
                Ok((messages, previous_cursor, new_cursor)) => {
                    let count = messages.len();
                    aggregation.batch.extend(messages);
                    ChannelOutcome::Fetched {
                        messages: count,
                        previous_cursor,
                        new_cursor,
                    }
                }
                Err(e @ DigestError::CursorStoreError(_)) => {
                    error!(channel = %ch.channel_id, "Cursor store failure: {}", e);
                    ChannelOutcome::CursorStoreFailed {
                        error: e.to_string(),
                    }
                }
                Err(e) => {
                    error!(channel = %ch.channel_id, "Error fetching messages: {}", e);
                    ChannelOutcome::FetchFailed {
                        error: e.to_string(),
                    }
                }
            };
            aggregation.reports.push(ChannelReport {
                channel_id: ch.channel_id.clone(),
                outcome,
            });
        }

        info!(
            "Aggregated {} messages from {} channels",
            aggregation.batch.len(),
            self.channels.len()
        );
        aggregation
    }

    async fn fetch_channel(
        &self,
        ch: &SourceChannel,
    ) -> Result<(Vec<FetchedMessage>, MessageId, MessageId), DigestError> {
        let channel_id = ch.channel_id.as_str();

        let stored = with_timeout(self.call_timeout, "read cursor", self.store.get(channel_id))
            .await
            .map_err(as_store_error)?;

        let result = ch
            .source
            .fetch(channel_id, stored, self.fetch_limit)
            .await
            .map_err(|e| e.into_channel_fetch(channel_id))?;

        if result.new_cursor < stored {
            warn!(
                channel = %channel_id,
                "Source reported cursor {} behind stored {}; keeping stored value",
                result.new_cursor, stored
            );
        }

        let messages = result.messages;

        if result.new_cursor > stored {
            with_timeout(
                self.call_timeout,
                "write cursor",
                self.store.set(channel_id, result.new_cursor),
            )
            .await
            .map_err(as_store_error)?;
            info!(
                channel = %channel_id,
                "Fetched {} messages, cursor {} -> {}",
                messages.len(),
                stored,
                result.new_cursor
            );
            Ok((messages, stored, result.new_cursor))
        } else {
            // Without a cursor advance nothing returned can be unseen
            if !messages.is_empty() {
                warn!(
                    channel = %channel_id,
                    "Discarding {} messages returned without a cursor advance",
                    messages.len()
                );
            }
            info!(channel = %channel_id, "No new messages after {}", stored);
            Ok((Vec::new(), stored, stored))
        }
    }
}

fn as_store_error(e: DigestError) -> DigestError {
    match e {
        DigestError::CursorStoreError(_) => e,
        other => DigestError::CursorStoreError(other.to_string()),
    }
}
