//! All Slack-specific functionality

pub mod client;
pub mod history;

// Re-export main types for convenience
pub use client::{SlackClient, message_id_to_ts, ts_to_message_id};
