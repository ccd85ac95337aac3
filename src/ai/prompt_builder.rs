//! Prompt construction for the digest summary

use openai_api_rs::v1::chat_completion::{ChatCompletionMessage, Content, MessageRole};

use crate::core::models::Batch;

/// Cap on an operator-supplied instruction override.
pub const MAX_INSTRUCTIONS_LEN: usize = 8000;

/// Task instruction sent as the system message unless the configuration
/// overrides it.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an analyst assistant that turns a feed of channel \
messages about financial markets (equities, forex, cryptocurrencies) into a single digest.

Each input line has the form `N. <message text> (Reference: <channel>:<message id>)`.

Tasks:
1. **Categorize** the messages (e.g. Market News, Technical Analysis, Announcements, Macro Data).
2. **Merge** messages that carry the same or overlapping information into one entry.
3. **Summarize** each category, keeping the key facts, figures and dates.
4. **Key influencing factors**: list the fundamentals behind the news (rates, employment data, \
regulation, project updates, geopolitics) and explain briefly how each could move the market.
5. **Conclusion**: a short wrap-up with upside and downside scenarios.
6. **References**: after every summarized point, cite the references of the messages it came from.

Rules:
- Do not give direct financial advice; present considerations, not recommendations.
- Be explicit about uncertainty and do not invent facts that are not in the messages.
- Keep each section to a few short paragraphs or bullet lists.
- Output only the digest, without restating these instructions.";

/// Deterministic numbered listing of the batch, one line per message:
/// `"{index}. {text} (Reference: {reference})"`, starting at 1.
#[must_use]
pub fn format_listing(batch: &Batch) -> String {
    batch
        .iter()
        .enumerate()
        .map(|(i, msg)| format!("{}. {} (Reference: {})\n", i + 1, msg.text, msg.reference))
        .collect()
}

/// Removes control characters except line breaks and tabs, then truncates.
#[must_use]
pub fn sanitize_instructions(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t'))
        .take(MAX_INSTRUCTIONS_LEN)
        .collect::<String>()
        .trim()
        .to_string()
}

fn text_message(role: MessageRole, text: String) -> ChatCompletionMessage {
    ChatCompletionMessage {
        role,
        content: Content::Text(text),
        name: None,
        tool_calls: None,
        tool_call_id: None,
    }
}

/// System instruction followed by the numbered listing as the user turn.
#[must_use]
pub fn build_prompt(batch: &Batch, instructions: Option<&str>) -> Vec<ChatCompletionMessage> {
    let system = instructions
        .map(sanitize_instructions)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

    vec![
        text_message(MessageRole::system, system),
        text_message(MessageRole::user, format_listing(batch)),
    ]
}
