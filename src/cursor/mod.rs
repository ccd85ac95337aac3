//! Durable per-channel cursors
//!
//! A cursor is the highest message id already processed for a channel. The
//! pipeline reads it before fetching and writes it back once that channel's
//! fetch has succeeded, which is what keeps each message to a single run.

pub mod memory;
pub mod sqlite;
pub mod ssm;

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::config::CursorStoreLocation;
use crate::core::models::MessageId;
use crate::errors::DigestError;

pub use memory::MemoryCursorStore;
pub use sqlite::SqliteCursorStore;
pub use ssm::SsmCursorStore;

#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Stored cursor for `channel_id`, or `0` when the channel has no record.
    ///
    /// # Errors
    ///
    /// Returns `CursorStoreError` when the backing store cannot be read. A
    /// missing record is not an error.
    async fn get(&self, channel_id: &str) -> Result<MessageId, DigestError>;

    /// Upserts the cursor to exactly `message_id`. Callers pass the maximum
    /// themselves; the store never compares against the previous value.
    ///
    /// # Errors
    ///
    /// Returns `CursorStoreError` when the write fails.
    async fn set(&self, channel_id: &str, message_id: MessageId) -> Result<(), DigestError>;
}

/// Opens the store named by the configuration.
///
/// # Errors
///
/// Returns `CursorStoreError` if the SQLite file cannot be opened or migrated.
pub async fn open_store(
    location: &CursorStoreLocation,
) -> Result<Arc<dyn CursorStore>, DigestError> {
    let store: Arc<dyn CursorStore> = match location {
        CursorStoreLocation::Sqlite(path) => Arc::new(SqliteCursorStore::open(path)?),
        CursorStoreLocation::Ssm { prefix } => Arc::new(SsmCursorStore::from_env(prefix).await),
        CursorStoreLocation::Memory => Arc::new(MemoryCursorStore::new()),
    };
    Ok(store)
}
