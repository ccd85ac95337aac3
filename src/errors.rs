use slack_morphism::errors::SlackClientError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DigestError {
    #[error("Failed to fetch messages from channel {channel}: {message}")]
    ChannelFetchError { channel: String, message: String },

    #[error("Failed to access cursor store: {0}")]
    CursorStoreError(String),

    #[error("Failed to generate summary: {0}")]
    SummarizationError(String),

    #[error("No new messages to summarize")]
    EmptyBatchError,

    #[error("Failed to publish summary ({sent}/{total} chunks sent): {message}")]
    PublishError {
        sent: usize,
        total: usize,
        message: String,
    },

    #[error("Failed to access chat platform API: {0}")]
    ApiError(String),

    #[error("Chat platform client is not authorized")]
    Unauthorized,

    #[error("Failed to access OpenAI API: {0}")]
    OpenAIError(String),

    #[error("Failed to send HTTP request: {0}")]
    HttpError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Timed out after {seconds}s: {operation}")]
    Timeout { operation: String, seconds: u64 },
}

impl DigestError {
    /// Errors the pipeline absorbs at the channel or run level. Everything
    /// else stops the process before a run starts.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ChannelFetchError { .. }
                | Self::CursorStoreError(_)
                | Self::SummarizationError(_)
                | Self::EmptyBatchError
                | Self::PublishError { .. }
                | Self::Timeout { .. }
        )
    }

    /// Re-tag a lower-level failure as a fetch failure for `channel`.
    /// Cursor store failures keep their kind.
    #[must_use]
    pub fn into_channel_fetch(self, channel: &str) -> Self {
        match self {
            Self::ChannelFetchError { .. } | Self::CursorStoreError(_) => self,
            other => Self::ChannelFetchError {
                channel: channel.to_string(),
                message: other.to_string(),
            },
        }
    }

    /// Re-tag any model-side failure as a summarization failure.
    #[must_use]
    pub fn into_summarization(self) -> Self {
        match self {
            Self::SummarizationError(_) | Self::EmptyBatchError => self,
            other => Self::SummarizationError(other.to_string()),
        }
    }
}

impl From<SlackClientError> for DigestError {
    fn from(error: SlackClientError) -> Self {
        DigestError::ApiError(error.to_string())
    }
}

impl From<reqwest::Error> for DigestError {
    fn from(error: reqwest::Error) -> Self {
        DigestError::HttpError(error.to_string())
    }
}

impl From<anyhow::Error> for DigestError {
    fn from(error: anyhow::Error) -> Self {
        DigestError::ApiError(error.to_string())
    }
}

impl From<rusqlite::Error> for DigestError {
    fn from(error: rusqlite::Error) -> Self {
        DigestError::CursorStoreError(error.to_string())
    }
}
