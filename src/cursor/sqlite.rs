use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use super::CursorStore;
use crate::core::models::MessageId;
use crate::errors::DigestError;

/// Cursor store backed by a single SQLite table.
///
/// The connection sits behind a `Mutex`, so concurrent upserts from the
/// aggregator's per-channel tasks are serialized.
pub struct SqliteCursorStore {
    db: Mutex<Connection>,
}

impl SqliteCursorStore {
    /// Opens (or creates) the database file and ensures the table exists.
    ///
    /// # Errors
    ///
    /// Returns `CursorStoreError` if the file cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self, DigestError> {
        let conn = Connection::open(path)?;
        debug!("Opened cursor database at {}", path.display());
        Self::from_connection(conn)
    }

    /// Private in-memory database, mostly for tests.
    ///
    /// # Errors
    ///
    /// Returns `CursorStoreError` if SQLite cannot allocate the database.
    pub fn open_in_memory() -> Result<Self, DigestError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// # Errors
    ///
    /// Returns `CursorStoreError` if the schema cannot be created.
    pub fn from_connection(conn: Connection) -> Result<Self, DigestError> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, DigestError> {
        self.db
            .lock()
            .map_err(|e| DigestError::CursorStoreError(format!("lock poisoned: {e}")))
    }
}

/// Safe to call on every startup.
fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS channel_cursor (
            channel_id       TEXT PRIMARY KEY,
            last_message_id  INTEGER
        );",
    )
}

#[async_trait]
impl CursorStore for SqliteCursorStore {
    async fn get(&self, channel_id: &str) -> Result<MessageId, DigestError> {
        let db = self.lock()?;
        let stored: Option<Option<i64>> = db
            .query_row(
                "SELECT last_message_id FROM channel_cursor WHERE channel_id = ?1",
                params![channel_id],
                |row| row.get(0),
            )
            .optional()?;

        // Absent row and NULL column both mean "never fetched"
        let raw = stored.flatten().unwrap_or(0);
        let id = MessageId::try_from(raw).map_err(|_| {
            DigestError::CursorStoreError(format!(
                "negative cursor {raw} stored for channel {channel_id}"
            ))
        })?;
        debug!("Last message ID for channel {}: {}", channel_id, id);
        Ok(id)
    }

    async fn set(&self, channel_id: &str, message_id: MessageId) -> Result<(), DigestError> {
        let value = i64::try_from(message_id).map_err(|_| {
            DigestError::CursorStoreError(format!(
                "cursor {message_id} for channel {channel_id} does not fit in SQLite INTEGER"
            ))
        })?;
        let db = self.lock()?;
        db.execute(
            "INSERT INTO channel_cursor (channel_id, last_message_id) VALUES (?1, ?2)
             ON CONFLICT(channel_id) DO UPDATE SET last_message_id = excluded.last_message_id",
            params![channel_id, value],
        )?;
        debug!("Saved last message ID {} for channel {}", message_id, channel_id);
        Ok(())
    }
}
