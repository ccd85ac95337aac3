//! All AI/LLM functionality

pub mod client;
pub mod prompt_builder;

use async_trait::async_trait;
use openai_api_rs::v1::chat_completion::ChatCompletionMessage;

use crate::errors::DigestError;

// Re-export main types for convenience
pub use client::{LlmClient, estimate_tokens};
pub use prompt_builder::{DEFAULT_SYSTEM_PROMPT, build_prompt, format_listing};

/// A single request/response completion. Model choice, temperature and token
/// limits belong to the implementation.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: Vec<ChatCompletionMessage>) -> Result<String, DigestError>;
}
