use std::sync::Arc;

use async_trait::async_trait;
use punchbridge_db::Database;
use punchbridge_types::CanonicalPunch;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Rejected(String),

    #[error("store task failed: {0}")]
    Task(String),
}

/// Write side of the relational store used by the ingest pipeline.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PunchStore: Send + Sync {
    /// Insert-or-ignore the terminal keyed by its serial.
    async fn upsert_device(&self, device_serial: &str) -> Result<(), StoreError>;

    /// Append the whole batch as one operation; a failure means nothing was
    /// inserted.
    async fn insert_punches(&self, punches: &[CanonicalPunch]) -> Result<usize, StoreError>;
}

/// [`PunchStore`] over the SQLite database. Queries run on the blocking
/// pool so the ingest worker never stalls the runtime.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Database>,
}

impl SqliteStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PunchStore for SqliteStore {
    async fn upsert_device(&self, device_serial: &str) -> Result<(), StoreError> {
        let db = Arc::clone(&self.db);
        let device_serial = device_serial.to_string();

        tokio::task::spawn_blocking(move || db.upsert_device(&device_serial))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
            .map_err(|e| StoreError::Rejected(format!("{:#}", e)))
    }

    async fn insert_punches(&self, punches: &[CanonicalPunch]) -> Result<usize, StoreError> {
        let db = Arc::clone(&self.db);
        let punches = punches.to_vec();

        tokio::task::spawn_blocking(move || db.insert_punches(&punches))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?
            .map_err(|e| StoreError::Rejected(format!("{:#}", e)))
    }
}
