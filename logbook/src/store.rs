//! Storage sinks for finished entries.
//!
//! An [`EntryStore`] persists one entry at a time. [`StoreHandler`] plugs a
//! store into a broker, so persistence failures end at the broker's handler
//! boundary instead of reaching the code that logged.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::{broker::MessageHandler, entry::LoggingEntry, error::HandlerError};

/// Failure to persist an entry.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage is unavailable: {0}")]
    Unavailable(String),

    #[error("Entry {id} was rejected by storage: {reason}")]
    Rejected { id: uuid::Uuid, reason: String },

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Durable storage for entries.
#[async_trait]
pub trait EntryStore: Send + Sync + 'static {
    /// Persists `entry`, returning the number of rows written.
    async fn persist(&self, entry: &LoggingEntry) -> Result<u64, StoreError>;
}

/// Broker handler persisting every [`LoggingEntry`] to a store.
#[derive(Debug)]
pub struct StoreHandler<S> {
    store: Arc<S>,
}

impl<S: EntryStore> StoreHandler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

#[async_trait]
impl<S: EntryStore> MessageHandler<LoggingEntry> for StoreHandler<S> {
    async fn handle(
        &self,
        entry: Arc<LoggingEntry>,
        cancel: CancellationToken,
    ) -> Result<(), HandlerError> {
        if cancel.is_cancelled() {
            return Err(HandlerError::new(format!(
                "entry {} not persisted: cancelled",
                entry.id()
            )));
        }
        self.store
            .persist(&entry)
            .await
            .map(|_| ())
            .map_err(|err| HandlerError::with_source(format!("entry {} not persisted", entry.id()), err))
    }
}

/// Keeps entries in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<Vec<LoggingEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the stored entries in persistence order.
    pub fn entries(&self) -> Vec<LoggingEntry> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl EntryStore for MemoryStore {
    async fn persist(&self, entry: &LoggingEntry) -> Result<u64, StoreError> {
        self.entries.lock().push(entry.clone());
        Ok(1)
    }
}
