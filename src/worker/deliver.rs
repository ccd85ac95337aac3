use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::errors::DigestError;
use crate::platform::ChatPlatform;
use crate::utils::with_timeout;

/// Splits `message` into consecutive chunks of at most `max_length`
/// characters. Only the last chunk may be shorter, and joining the chunks
/// gives back the input exactly. An empty input yields no chunks.
#[must_use]
pub fn split_message(message: &str, max_length: usize) -> Vec<String> {
    let max_length = max_length.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0;

    for c in message.chars() {
        current.push(c);
        count += 1;
        if count == max_length {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Posts a summary to the output channel, chunk by chunk.
pub struct Publisher {
    platform: Arc<dyn ChatPlatform>,
    output_channel: String,
    chunk_delay: Duration,
    call_timeout: Duration,
}

impl Publisher {
    #[must_use]
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        output_channel: impl Into<String>,
        chunk_delay: Duration,
        call_timeout: Duration,
    ) -> Self {
        Self {
            platform,
            output_channel: output_channel.into(),
            chunk_delay,
            call_timeout,
        }
    }

    /// Sends the chunks in order with a pause between consecutive sends and
    /// returns how many were delivered.
    ///
    /// # Errors
    ///
    /// Returns `PublishError` at the first failed send (or when the output
    /// channel cannot be resolved). Chunks already sent stay sent and the
    /// rest are dropped.
    pub async fn publish(&self, summary: &str, max_chunk_length: usize) -> Result<usize, DigestError> {
        let chunks = split_message(summary, max_chunk_length);
        let total = chunks.len();
        if total == 0 {
            info!("Empty summary, nothing to publish");
            return Ok(0);
        }

        let entity = with_timeout(
            self.call_timeout,
            "resolve output channel",
            self.platform.get_entity(&self.output_channel),
        )
        .await
        .map_err(|e| DigestError::PublishError {
            sent: 0,
            total,
            message: e.to_string(),
        })?;

        for (i, chunk) in chunks.iter().enumerate() {
            if i > 0 && !self.chunk_delay.is_zero() {
                tokio::time::sleep(self.chunk_delay).await;
            }

            if let Err(e) = with_timeout(
                self.call_timeout,
                "send chunk",
                self.platform.send_message(&entity, chunk),
            )
            .await
            {
                error!(
                    "Failed to send chunk {}/{} to {}: {}",
                    i + 1,
                    total,
                    self.output_channel,
                    e
                );
                return Err(DigestError::PublishError {
                    sent: i,
                    total,
                    message: e.to_string(),
                });
            }
        }

        info!(
            "Summary sent to output channel {} in {} chunks",
            self.output_channel, total
        );
        Ok(total)
    }
}
