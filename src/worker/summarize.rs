use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::ai::{LanguageModel, build_prompt};
use crate::core::models::Batch;
use crate::errors::DigestError;
use crate::utils::with_timeout;

/// Turns a batch into one summary string with a single model call.
pub struct Summarizer {
    model: Arc<dyn LanguageModel>,
    instructions: Option<String>,
    call_timeout: Duration,
}

impl Summarizer {
    #[must_use]
    pub fn new(
        model: Arc<dyn LanguageModel>,
        instructions: Option<String>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            model,
            instructions,
            call_timeout,
        }
    }

    /// # Errors
    ///
    /// Returns `EmptyBatchError` for an empty batch without calling the
    /// model, and `SummarizationError` when the call fails, times out or
    /// comes back blank.
    pub async fn summarize(&self, batch: &Batch) -> Result<String, DigestError> {
        if batch.is_empty() {
            return Err(DigestError::EmptyBatchError);
        }

        let prompt = build_prompt(batch, self.instructions.as_deref());
        info!("Summarizing {} messages", batch.len());

        let summary = with_timeout(self.call_timeout, "model completion", self.model.complete(prompt))
            .await
            .map_err(DigestError::into_summarization)?;

        if summary.trim().is_empty() {
            return Err(DigestError::SummarizationError(
                "model returned an empty summary".to_string(),
            ));
        }

        info!("Summary generated ({} chars)", summary.chars().count());
        Ok(summary)
    }
}
