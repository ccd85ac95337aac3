#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use channel_digest::ai::LanguageModel;
use channel_digest::core::config::AppConfig;
use channel_digest::core::models::{FetchResult, FetchedMessage, MessageId};
use channel_digest::cursor::{CursorStore, MemoryCursorStore};
use channel_digest::errors::DigestError;
use channel_digest::platform::{ChannelEntity, ChatPlatform, PlatformMessage};
use channel_digest::source::ChannelSource;
use openai_api_rs::v1::chat_completion::{ChatCompletionMessage, Content};

pub const OUTPUT_CHANNEL: &str = "digest-out";

/// Config for tests: in-memory cursors, no chunk delay, short timeouts.
pub fn test_config(channels: &[&str], fetch_limit: u32, max_chunk_length: usize) -> AppConfig {
    let mut env: config::Map<String, String> = config::Map::new();
    env.insert("DIGEST_CHANNELS".to_string(), channels.join(","));
    env.insert("DIGEST_OUTPUT_CHANNEL".to_string(), OUTPUT_CHANNEL.to_string());
    env.insert("DIGEST_FETCH_LIMIT".to_string(), fetch_limit.to_string());
    env.insert("DIGEST_MAX_CHUNK_LENGTH".to_string(), max_chunk_length.to_string());
    env.insert("DIGEST_CHUNK_DELAY_MS".to_string(), "0".to_string());
    env.insert("DIGEST_CALL_TIMEOUT_SECS".to_string(), "5".to_string());
    env.insert("DIGEST_CURSOR_STORE".to_string(), "memory".to_string());
    env.insert("SLACK_BOT_TOKEN".to_string(), "xoxb-test".to_string());
    env.insert("OPENAI_API_KEY".to_string(), "sk-test".to_string());

    AppConfig::from_vars(env).expect("test config is valid")
}

pub fn text_msg(id: MessageId, text: &str) -> PlatformMessage {
    PlatformMessage {
        id,
        text: Some(text.to_string()),
    }
}

pub fn empty_msg(id: MessageId) -> PlatformMessage {
    PlatformMessage { id, text: None }
}

/// Scripted chat platform. Channel histories are fixed up front; sends are
/// recorded in order.
#[derive(Default)]
pub struct FakePlatform {
    histories: Mutex<HashMap<String, Vec<PlatformMessage>>>,
    failing_channels: Mutex<HashSet<String>>,
    unauthorized: bool,
    connect_fails: bool,
    fail_sends_after: Option<usize>,
    sent: Mutex<Vec<(String, String)>>,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(self, channel: &str, messages: Vec<PlatformMessage>) -> Self {
        self.histories
            .lock()
            .unwrap()
            .insert(channel.to_string(), messages);
        self
    }

    pub fn failing(self, channel: &str) -> Self {
        self.failing_channels
            .lock()
            .unwrap()
            .insert(channel.to_string());
        self
    }

    pub fn unauthorized(mut self) -> Self {
        self.unauthorized = true;
        self
    }

    pub fn connect_fails(mut self) -> Self {
        self.connect_fails = true;
        self
    }

    /// The send after the first `n` successful ones fails.
    pub fn fail_sends_after(mut self, n: usize) -> Self {
        self.fail_sends_after = Some(n);
        self
    }

    pub fn push_messages(&self, channel: &str, messages: Vec<PlatformMessage>) {
        self.histories
            .lock()
            .unwrap()
            .entry(channel.to_string())
            .or_default()
            .extend(messages);
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn sent_to(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(channel, _)| channel.clone())
            .collect()
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatPlatform for FakePlatform {
    async fn connect(&self) -> Result<(), DigestError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.connect_fails {
            return Err(DigestError::ApiError("connection refused".to_string()));
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), DigestError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn is_authorized(&self) -> Result<bool, DigestError> {
        Ok(!self.unauthorized)
    }

    async fn get_entity(&self, identifier: &str) -> Result<ChannelEntity, DigestError> {
        Ok(ChannelEntity::new(identifier))
    }

    async fn iter_messages(
        &self,
        entity: &ChannelEntity,
        min_id: MessageId,
        limit: u32,
    ) -> Result<Vec<PlatformMessage>, DigestError> {
        if self.failing_channels.lock().unwrap().contains(&entity.id) {
            return Err(DigestError::ApiError(format!(
                "channel_not_found: {}",
                entity.id
            )));
        }
        let mut messages: Vec<PlatformMessage> = self
            .histories
            .lock()
            .unwrap()
            .get(&entity.id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|m| m.id > min_id)
            .collect();
        messages.sort_by_key(|m| m.id);
        messages.truncate(limit as usize);
        Ok(messages)
    }

    async fn send_message(&self, entity: &ChannelEntity, text: &str) -> Result<(), DigestError> {
        let mut sent = self.sent.lock().unwrap();
        if self.fail_sends_after.is_some_and(|n| sent.len() >= n) {
            return Err(DigestError::ApiError("rate_limited".to_string()));
        }
        sent.push((entity.id.clone(), text.to_string()));
        Ok(())
    }
}

/// Language model that answers with a fixed reply and remembers the user
/// turn of every prompt it received.
pub struct FakeModel {
    reply: Result<String, String>,
    listings: Mutex<Vec<String>>,
}

impl FakeModel {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            listings: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            listings: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.listings.lock().unwrap().len()
    }

    pub fn listings(&self) -> Vec<String> {
        self.listings.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    async fn complete(&self, prompt: Vec<ChatCompletionMessage>) -> Result<String, DigestError> {
        let listing = prompt
            .last()
            .map(|m| match &m.content {
                Content::Text(text) => text.clone(),
                _ => String::new(),
            })
            .unwrap_or_default();
        self.listings.lock().unwrap().push(listing);

        self.reply
            .clone()
            .map_err(DigestError::OpenAIError)
    }
}

/// Memory store whose reads or writes fail for chosen channels.
#[derive(Default)]
pub struct FailingCursorStore {
    inner: MemoryCursorStore,
    fail_get: HashSet<String>,
    fail_set: HashSet<String>,
}

impl FailingCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_get(mut self, channel: &str) -> Self {
        self.fail_get.insert(channel.to_string());
        self
    }

    pub fn failing_set(mut self, channel: &str) -> Self {
        self.fail_set.insert(channel.to_string());
        self
    }

    pub fn inner(&self) -> &MemoryCursorStore {
        &self.inner
    }
}

#[async_trait]
impl CursorStore for FailingCursorStore {
    async fn get(&self, channel_id: &str) -> Result<MessageId, DigestError> {
        if self.fail_get.contains(channel_id) {
            return Err(DigestError::CursorStoreError("database is locked".to_string()));
        }
        self.inner.get(channel_id).await
    }

    async fn set(&self, channel_id: &str, message_id: MessageId) -> Result<(), DigestError> {
        if self.fail_set.contains(channel_id) {
            return Err(DigestError::CursorStoreError("disk I/O error".to_string()));
        }
        self.inner.set(channel_id, message_id).await
    }
}

/// Channel source that answers every fetch with the same messages and a
/// cursor computed from the stored one.
pub struct ScriptedSource {
    messages: Vec<(MessageId, String)>,
    cursor_from: fn(MessageId) -> MessageId,
    fetches: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(messages: &[(MessageId, &str)], cursor_from: fn(MessageId) -> MessageId) -> Self {
        Self {
            messages: messages
                .iter()
                .map(|(id, text)| (*id, (*text).to_string()))
                .collect(),
            cursor_from,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelSource for ScriptedSource {
    async fn fetch(
        &self,
        channel_id: &str,
        cursor: MessageId,
        _fetch_limit: u32,
    ) -> Result<FetchResult, DigestError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(FetchResult {
            messages: self
                .messages
                .iter()
                .map(|(id, text)| FetchedMessage::new(text.clone(), channel_id, *id))
                .collect(),
            new_cursor: (self.cursor_from)(cursor),
        })
    }
}
