//! The chat-platform capability the pipeline depends on
//!
//! Any platform that can resolve a channel, list its history after a given
//! message id and post text can back both the channel sources and the
//! publisher. `crate::slack::SlackClient` is the shipped implementation.

use async_trait::async_trait;

use crate::core::models::MessageId;
use crate::errors::DigestError;

/// A resolved channel handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEntity {
    pub id: String,
    pub name: Option<String>,
    /// Creation time on the message id scale, when the platform reports it.
    pub created: Option<MessageId>,
}

impl ChannelEntity {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            created: None,
        }
    }
}

/// One message as the platform returns it. `text` is `None` for messages
/// that carry no text (media-only posts, joins).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformMessage {
    pub id: MessageId,
    pub text: Option<String>,
}

/// Keeps messages with id above `min_id`, ascending and without repeated
/// ids, at most `limit` of them.
#[must_use]
pub fn oldest_unseen(
    messages: impl IntoIterator<Item = PlatformMessage>,
    min_id: MessageId,
    limit: u32,
) -> Vec<PlatformMessage> {
    let mut fresh: Vec<PlatformMessage> = messages.into_iter().filter(|m| m.id > min_id).collect();
    fresh.sort_by_key(|m| m.id);
    fresh.dedup_by_key(|m| m.id);
    fresh.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
    fresh
}

#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Opens whatever session the platform needs. HTTP platforms do nothing.
    async fn connect(&self) -> Result<(), DigestError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), DigestError> {
        Ok(())
    }

    async fn is_authorized(&self) -> Result<bool, DigestError>;

    /// Resolves a configured identifier (id or `#name`) to a channel.
    async fn get_entity(&self, identifier: &str) -> Result<ChannelEntity, DigestError>;

    /// Messages with id strictly greater than `min_id`, oldest first, at most
    /// `limit` of them.
    async fn iter_messages(
        &self,
        entity: &ChannelEntity,
        min_id: MessageId,
        limit: u32,
    ) -> Result<Vec<PlatformMessage>, DigestError>;

    async fn send_message(&self, entity: &ChannelEntity, text: &str) -> Result<(), DigestError>;
}
