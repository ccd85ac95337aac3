//! LLM (`OpenAI`) API client module
//!
//! Encapsulates the single completion call used to produce a digest.

use async_trait::async_trait;
use openai_api_rs::v1::chat_completion::{ChatCompletionMessage, Content, MessageRole};
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::info;

use super::LanguageModel;
use crate::errors::DigestError;

const MAX_CONTEXT_TOKENS: usize = 128_000;
const MAX_OUTPUT_TOKENS: usize = 16_000;
const TOKEN_BUFFER: usize = 250;
const MIN_OUTPUT_TOKENS: usize = 500;

const RESPONSES_URL: &str = "https://api.openai.com/v1/responses";

#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4 + 1
}

/// LLM API client for generating summaries
pub struct LlmClient {
    api_key: String,
    org_id: Option<String>,
    model_name: String,
    temperature: Option<f32>,
    http: Client,
}

impl LlmClient {
    /// # Errors
    ///
    /// Returns `HttpError` if the HTTP client cannot be built.
    pub fn new(
        api_key: String,
        org_id: Option<String>,
        model_name: String,
        temperature: Option<f32>,
        timeout: Duration,
    ) -> Result<Self, DigestError> {
        let http = Client::builder().timeout(timeout).build().map_err(|e| {
            DigestError::HttpError(format!("Failed to build OpenAI HTTP client: {e}"))
        })?;

        Ok(Self {
            api_key,
            org_id,
            model_name,
            temperature,
            http,
        })
    }

    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Output budget left after the prompt, or `None` when the prompt alone
    /// leaves too little room for a useful answer.
    #[must_use]
    pub fn output_budget(prompt: &[ChatCompletionMessage]) -> Option<usize> {
        let estimated_input_tokens = prompt
            .iter()
            .map(|msg| match &msg.content {
                Content::Text(t) => estimate_tokens(t),
                Content::ImageUrl(_) => 0,
            })
            .sum::<usize>();

        info!("Estimated input tokens: {}", estimated_input_tokens);

        let max_output_tokens = MAX_CONTEXT_TOKENS
            .saturating_sub(estimated_input_tokens)
            .saturating_sub(TOKEN_BUFFER)
            .min(MAX_OUTPUT_TOKENS);

        (max_output_tokens >= MIN_OUTPUT_TOKENS).then_some(max_output_tokens)
    }

    fn request_body(&self, prompt: &[ChatCompletionMessage], max_output_tokens: usize) -> Value {
        let mut body = json!({
            "model": self.model_name,
            "input": build_responses_input_from_prompt(prompt),
            "max_output_tokens": max_output_tokens
        });
        if let Some(t) = self.temperature {
            body["temperature"] = json!(t);
        }
        body
    }

    fn headers(&self) -> Result<reqwest::header::HeaderMap, DigestError> {
        let mut headers = reqwest::header::HeaderMap::new();
        let auth_value = format!("Bearer {}", self.api_key)
            .parse()
            .map_err(|e| DigestError::HttpError(format!("Invalid Authorization header: {e}")))?;
        headers.insert("Authorization", auth_value);

        let content_type_value = "application/json"
            .parse()
            .map_err(|e| DigestError::HttpError(format!("Invalid Content-Type header: {e}")))?;
        headers.insert("Content-Type", content_type_value);

        if let Some(org) = &self.org_id {
            let org_value = org.parse().map_err(|e| {
                DigestError::HttpError(format!("Invalid OpenAI-Organization header: {e}"))
            })?;
            headers.insert("OpenAI-Organization", org_value);
        }
        Ok(headers)
    }
}

#[async_trait]
impl LanguageModel for LlmClient {
    async fn complete(&self, prompt: Vec<ChatCompletionMessage>) -> Result<String, DigestError> {
        #[cfg(feature = "debug-logs")]
        info!("Using prompt:\n{:?}", prompt);

        #[cfg(not(feature = "debug-logs"))]
        info!(
            "Requesting completion from {} with {} messages in prompt",
            self.model_name,
            prompt.len()
        );

        let Some(max_output_tokens) = Self::output_budget(&prompt) else {
            return Err(DigestError::OpenAIError(
                "Prompt too large for the model context window".to_string(),
            ));
        };
        info!("Calculated max output tokens: {}", max_output_tokens);

        let response = self
            .http
            .post(RESPONSES_URL)
            .headers(self.headers()?)
            .json(&self.request_body(&prompt, max_output_tokens))
            .send()
            .await
            .map_err(|e| DigestError::HttpError(format!("OpenAI API request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|e| {
                format!("Failed to read error response body (status {status}): {e}")
            });
            return Err(DigestError::OpenAIError(format!(
                "OpenAI API error (status {status}): {error_text}"
            )));
        }

        let response_json: Value = response.json().await.map_err(|e| {
            DigestError::OpenAIError(format!("Failed to parse OpenAI response: {e}"))
        })?;

        extract_output_text(&response_json)
            .ok_or_else(|| DigestError::OpenAIError("No text in response".to_string()))
    }
}

/// Pulls the generated text out of a Responses API payload: the top-level
/// `output_text` convenience field when present, else every `output_text`
/// part under `output[].content[]`, joined by newlines.
#[must_use]
pub fn extract_output_text(response_json: &Value) -> Option<String> {
    if let Some(s) = response_json.get("output_text").and_then(Value::as_str) {
        return Some(s.to_string());
    }

    let mut collected: Vec<String> = Vec::new();
    let items = response_json.get("output").and_then(Value::as_array)?;
    for item in items {
        let Some(parts) = item.get("content").and_then(Value::as_array) else {
            continue;
        };
        for p in parts {
            let is_output_text = p
                .get("type")
                .and_then(Value::as_str)
                .is_some_and(|t| t == "output_text");
            if !is_output_text {
                continue;
            }
            if let Some(s) = p.get("text").and_then(Value::as_str) {
                collected.push(s.to_string());
            } else if let Some(s) = p
                .get("text")
                .and_then(|t| t.get("value"))
                .and_then(Value::as_str)
            {
                collected.push(s.to_string());
            }
        }
    }

    if collected.is_empty() {
        None
    } else {
        Some(collected.join("\n"))
    }
}

/// Build Responses API input payload from a chat-style prompt.
/// - Filters out assistant messages (Responses treats assistant content as output)
/// - Emits typed parts: { type: "`input_text`", text }
pub(crate) fn build_responses_input_from_prompt(prompt: &[ChatCompletionMessage]) -> Vec<Value> {
    prompt
        .iter()
        .filter(|m| !matches!(m.role, MessageRole::assistant))
        .map(|m| {
            let role_str = match m.role {
                MessageRole::system => "system",
                MessageRole::user | MessageRole::function | MessageRole::tool => "user",
                MessageRole::assistant => "assistant",
            };

            let parts: Vec<Value> = match &m.content {
                Content::Text(t) => vec![json!({
                    "type": "input_text",
                    "text": t
                })],
                Content::ImageUrl(imgs) => imgs
                    .iter()
                    .filter_map(|img| img.image_url.as_ref())
                    .map(|iu| {
                        json!({
                            "type": "input_image",
                            "image_url": iu.url
                        })
                    })
                    .collect(),
            };

            json!({
                "role": role_str,
                "content": parts
            })
        })
        .collect()
}
