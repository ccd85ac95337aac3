//! Configuration and the data types shared by every pipeline stage

pub mod config;
pub mod models;

pub use config::{AppConfig, CursorStoreLocation};
pub use models::{Batch, ChannelCursor, FetchResult, FetchedMessage, MessageId};
