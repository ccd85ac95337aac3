//! The digest pipeline: aggregate, summarize, publish

pub mod aggregate;
pub mod deliver;
pub mod handler;
pub mod pipeline;
pub mod summarize;

pub use aggregate::{Aggregation, Aggregator, ChannelOutcome, ChannelReport, SourceChannel};
pub use deliver::{Publisher, split_message};
pub use handler::{build_driver, function_handler};
pub use pipeline::{PipelineDriver, RunOutcome, RunReport};
pub use summarize::Summarizer;
