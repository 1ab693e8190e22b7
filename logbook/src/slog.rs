//! Writing entries through `slog`.
//!
//! [`LoggingEntry`] implements `slog::Value`, emitting the whole entry as
//! structured JSON via `slog`'s nested-value support. [`SlogStore`] is an
//! [`EntryStore`] that logs every persisted entry to a `slog::Logger`.
//!
//! Entries only ever hold already-redacted text, so nothing here consults the
//! registry. Serialization failures are logged as a placeholder string rather
//! than returned to `slog`.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use slog::{Key, Record, Result as SlogResult, Serializer, Value as SlogValue};

use crate::{
    entry::{LogLevel, LoggingEntry},
    store::{EntryStore, StoreError},
};

/// Emitted in place of an entry that could not be converted to JSON.
pub const SERIALIZATION_FAILED: &str = "Failed to serialize logging entry";

impl SlogValue for LoggingEntry {
    fn serialize(
        &self,
        record: &Record<'_>,
        key: Key,
        serializer: &mut dyn Serializer,
    ) -> SlogResult {
        let json = serde_json::to_value(self)
            .unwrap_or_else(|_| JsonValue::String(SERIALIZATION_FAILED.to_owned()));
        SlogValue::serialize(&slog::Serde(json), record, key, serializer)
    }
}

/// Logs entries to a `slog::Logger` at their own level.
#[derive(Clone, Debug)]
pub struct SlogStore {
    logger: slog::Logger,
}

impl SlogStore {
    pub fn new(logger: slog::Logger) -> Self {
        Self { logger }
    }
}

#[async_trait]
impl EntryStore for SlogStore {
    async fn persist(&self, entry: &LoggingEntry) -> Result<u64, StoreError> {
        let logger = &self.logger;
        let message = entry.message();
        let kv = slog::o!(
            "category" => entry.category().to_owned(),
            "event_id" => entry.event_id(),
            "entry" => entry.clone(),
        );
        let logger = logger.new(kv);
        match entry.level() {
            LogLevel::Trace => slog::trace!(logger, "{}", message),
            LogLevel::Debug => slog::debug!(logger, "{}", message),
            LogLevel::Information => slog::info!(logger, "{}", message),
            LogLevel::Warning => slog::warn!(logger, "{}", message),
            LogLevel::Error => slog::error!(logger, "{}", message),
            LogLevel::Critical => slog::crit!(logger, "{}", message),
            LogLevel::None => return Ok(0),
        }
        Ok(1)
    }
}
