use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use super::aggregate::{Aggregator, ChannelReport, SourceChannel};
use super::deliver::Publisher;
use super::summarize::Summarizer;
use crate::ai::LanguageModel;
use crate::core::config::AppConfig;
use crate::cursor::CursorStore;
use crate::errors::DigestError;
use crate::platform::ChatPlatform;
use crate::source::{ChannelSource, PlatformSource};
use crate::utils::with_timeout;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// No channel produced anything new; nothing was summarized.
    NoNewMessages,
    Published { chunks: usize },
    SummarizationFailed { error: String },
    PublishFailed { sent: usize, total: usize, error: String },
    /// The platform could not be reached before any channel was read.
    PlatformUnavailable { error: String },
    NotAuthorized,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub channels: Vec<ChannelReport>,
    pub batch_size: usize,
    #[serde(flatten)]
    pub outcome: RunOutcome,
}

impl RunReport {
    /// True when channels were configured and every one of them failed.
    #[must_use]
    pub fn all_channels_failed(&self) -> bool {
        !self.channels.is_empty() && self.channels.iter().all(|c| c.outcome.is_failure())
    }

    /// Whether the process should exit non-zero for this run.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.outcome,
            RunOutcome::NotAuthorized | RunOutcome::PlatformUnavailable { .. }
        ) || self.all_channels_failed()
    }
}

/// Runs one aggregate → summarize → publish pass. Never returns an error;
/// every failure ends up in the log and the returned [`RunReport`].
pub struct PipelineDriver {
    platform: Arc<dyn ChatPlatform>,
    aggregator: Aggregator,
    summarizer: Summarizer,
    publisher: Publisher,
    max_chunk_length: usize,
    call_timeout: Duration,
}

impl PipelineDriver {
    #[must_use]
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        aggregator: Aggregator,
        summarizer: Summarizer,
        publisher: Publisher,
        max_chunk_length: usize,
        call_timeout: Duration,
    ) -> Self {
        Self {
            platform,
            aggregator,
            summarizer,
            publisher,
            max_chunk_length,
            call_timeout,
        }
    }

    /// Wires every component from the configuration. All configured channels
    /// are read through the same platform the summary is published to.
    #[must_use]
    pub fn from_config(
        config: &AppConfig,
        platform: Arc<dyn ChatPlatform>,
        model: Arc<dyn LanguageModel>,
        store: Arc<dyn CursorStore>,
    ) -> Self {
        let source: Arc<dyn ChannelSource> =
            Arc::new(PlatformSource::new(Arc::clone(&platform), config.call_timeout));
        let channels = config
            .channels
            .iter()
            .map(|id| SourceChannel::new(id.clone(), Arc::clone(&source)))
            .collect();

        Self::new(
            Arc::clone(&platform),
            Aggregator::new(store, channels, config.fetch_limit, config.call_timeout),
            Summarizer::new(model, config.system_prompt.clone(), config.call_timeout),
            Publisher::new(
                platform,
                config.output_channel.clone(),
                config.chunk_delay,
                config.call_timeout,
            ),
            config.max_chunk_length,
            config.call_timeout,
        )
    }

    pub async fn run(&self) -> RunReport {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("digest_run", run_id = %run_id);
        self.run_inner(run_id).instrument(span).await
    }

    async fn run_inner(&self, run_id: String) -> RunReport {
        let mut report = RunReport {
            run_id,
            started_at: Utc::now(),
            channels: Vec::new(),
            batch_size: 0,
            outcome: RunOutcome::NoNewMessages,
        };

        report.outcome = match self.session_ready().await {
            Ok(true) => self.process(&mut report).await,
            Ok(false) => {
                error!("Chat platform client is not authorized; check the credentials");
                RunOutcome::NotAuthorized
            }
            Err(e) => {
                error!("Failed to connect to chat platform: {}", e);
                RunOutcome::PlatformUnavailable {
                    error: e.to_string(),
                }
            }
        };

        if let Err(e) = with_timeout(self.call_timeout, "disconnect", self.platform.disconnect()).await {
            warn!("Failed to disconnect chat platform client: {}", e);
        } else {
            info!("Chat platform client disconnected");
        }

        info!(
            "Run finished: {} messages, outcome {:?}",
            report.batch_size, report.outcome
        );
        report
    }

    async fn session_ready(&self) -> Result<bool, DigestError> {
        with_timeout(self.call_timeout, "connect", self.platform.connect()).await?;
        with_timeout(self.call_timeout, "authorization check", self.platform.is_authorized()).await
    }

    async fn process(&self, report: &mut RunReport) -> RunOutcome {
        info!(
            "Fetching data from {} channels",
            self.aggregator.channel_count()
        );
        let aggregation = self.aggregator.fetch_all().await;
        report.channels = aggregation.reports;
        report.batch_size = aggregation.batch.len();

        if aggregation.batch.is_empty() {
            info!("No new messages to process");
            return RunOutcome::NoNewMessages;
        }

        // Cursors are already committed; a failure from here on loses this
        // summary but never re-delivers these messages.
        let summary = match self.summarizer.summarize(&aggregation.batch).await {
            Ok(summary) => summary,
            Err(e) => {
                error!("Failed to generate summary: {}", e);
                return RunOutcome::SummarizationFailed {
                    error: e.to_string(),
                };
            }
        };

        match self.publisher.publish(&summary, self.max_chunk_length).await {
            Ok(chunks) => RunOutcome::Published { chunks },
            Err(DigestError::PublishError {
                sent,
                total,
                message,
            }) => {
                error!(
                    "Failed to send summary to output channel after {}/{} chunks: {}",
                    sent, total, message
                );
                RunOutcome::PublishFailed {
                    sent,
                    total,
                    error: message,
                }
            }
            Err(e) => {
                error!("Failed to send summary to output channel: {}", e);
                RunOutcome::PublishFailed {
                    sent: 0,
                    total: 0,
                    error: e.to_string(),
                }
            }
        }
    }
}
