use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::CursorStore;
use crate::core::models::{ChannelCursor, MessageId};
use crate::errors::DigestError;

/// Process-local cursor store. Nothing survives a restart, so it is only
/// useful for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    cursors: Mutex<HashMap<String, MessageId>>,
}

impl MemoryCursorStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with the given cursors.
    #[must_use]
    pub fn with_cursors(cursors: impl IntoIterator<Item = ChannelCursor>) -> Self {
        let map = cursors
            .into_iter()
            .map(|c| (c.channel_id, c.last_message_id))
            .collect();
        Self {
            cursors: Mutex::new(map),
        }
    }

    /// Whether a record exists for `channel_id`, as opposed to reading `0`.
    #[must_use]
    pub fn contains(&self, channel_id: &str) -> bool {
        self.cursors
            .lock()
            .is_ok_and(|map| map.contains_key(channel_id))
    }

    /// All stored cursors, sorted by channel id.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ChannelCursor> {
        let mut all: Vec<ChannelCursor> = self
            .cursors
            .lock()
            .map(|map| {
                map.iter()
                    .map(|(channel_id, id)| ChannelCursor {
                        channel_id: channel_id.clone(),
                        last_message_id: *id,
                    })
                    .collect()
            })
            .unwrap_or_default();
        all.sort_by(|a, b| a.channel_id.cmp(&b.channel_id));
        all
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn get(&self, channel_id: &str) -> Result<MessageId, DigestError> {
        let map = self
            .cursors
            .lock()
            .map_err(|e| DigestError::CursorStoreError(format!("lock poisoned: {e}")))?;
        Ok(map.get(channel_id).copied().unwrap_or(0))
    }

    async fn set(&self, channel_id: &str, message_id: MessageId) -> Result<(), DigestError> {
        let mut map = self
            .cursors
            .lock()
            .map_err(|e| DigestError::CursorStoreError(format!("lock poisoned: {e}")))?;
        map.insert(channel_id.to_string(), message_id);
        Ok(())
    }
}
