use serde::{Deserialize, Serialize};

/// Platform message identifier. Cursors compare these numerically.
pub type MessageId = u64;

/// Highest message id already processed for one channel. `0` means the
/// channel has never been fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelCursor {
    pub channel_id: String,
    pub last_message_id: MessageId,
}

/// A message picked up in the current run, with a pointer back to where it
/// came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedMessage {
    pub text: String,
    pub reference: String,
}

impl FetchedMessage {
    #[must_use]
    pub fn new(text: impl Into<String>, channel_id: &str, message_id: MessageId) -> Self {
        Self {
            text: text.into(),
            reference: format_reference(channel_id, message_id),
        }
    }
}

#[must_use]
pub fn format_reference(channel_id: &str, message_id: MessageId) -> String {
    format!("{channel_id}:{message_id}")
}

/// What a channel source hands back for one channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResult {
    /// Messages with text, ascending by id.
    pub messages: Vec<FetchedMessage>,
    /// Highest id seen, including messages without text.
    pub new_cursor: MessageId,
}

/// Messages collected across every channel for one run, in channel
/// configuration order and ascending id order within a channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    messages: Vec<FetchedMessage>,
}

impl Batch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, messages: impl IntoIterator<Item = FetchedMessage>) {
        self.messages.extend(messages);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn messages(&self) -> &[FetchedMessage] {
        &self.messages
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FetchedMessage> {
        self.messages.iter()
    }
}

impl From<Vec<FetchedMessage>> for Batch {
    fn from(messages: Vec<FetchedMessage>) -> Self {
        Self { messages }
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a FetchedMessage;
    type IntoIter = std::slice::Iter<'a, FetchedMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}
