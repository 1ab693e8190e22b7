//! The record one log call produces.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Causes deeper than this are not recorded.
pub const MAX_ERROR_DEPTH: usize = 32;

/// Severity of a log call, lowest first.
///
/// `None` is never written; as a minimum level it disables a logger.
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Information,
    Warning,
    Error,
    Critical,
    None,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Information => "information",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Critical => "critical",
            LogLevel::None => "none",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies a kind of event across log calls.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct EventId {
    pub id: i32,
    pub name: Option<String>,
}

impl EventId {
    pub fn new(id: i32) -> Self {
        Self { id, name: None }
    }

    #[must_use]
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl From<i32> for EventId {
    fn from(id: i32) -> Self {
        Self::new(id)
    }
}

/// Ambient context captured from a logger's scopes.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ScopeEntry {
    pub message: String,
    pub properties: Vec<(String, String)>,
}

/// One error of a cause chain.
///
/// `source_id` points at the error this one was caused by, so a chain stays a
/// flat, serializable list.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub id: Uuid,
    pub message: String,
    pub details: String,
    pub source_id: Option<Uuid>,
}

impl ErrorEntry {
    /// Flattens `error` and its sources, outermost first.
    pub fn chain(error: &(dyn std::error::Error + 'static)) -> Vec<ErrorEntry> {
        let mut entries: Vec<ErrorEntry> = Vec::new();
        let mut current = Some(error);
        while let Some(error) = current {
            if entries.len() == MAX_ERROR_DEPTH {
                break;
            }
            entries.push(ErrorEntry {
                id: Uuid::new_v4(),
                message: error.to_string(),
                details: format!("{error:?}"),
                source_id: None,
            });
            current = error.source();
        }
        for i in 1..entries.len() {
            entries[i - 1].source_id = Some(entries[i].id);
        }
        entries
    }
}

/// A complete log record. Immutable once built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoggingEntry {
    id: Uuid,
    timestamp: DateTime<Utc>,
    level: LogLevel,
    category: String,
    event_id: i32,
    event_name: Option<String>,
    message: String,
    properties: Vec<(String, String)>,
    scopes: Vec<ScopeEntry>,
    errors: Vec<ErrorEntry>,
}

impl LoggingEntry {
    pub fn builder<S: Into<String>>(level: LogLevel, category: S) -> LoggingEntryBuilder {
        LoggingEntryBuilder {
            entry: LoggingEntry {
                id: Uuid::new_v4(),
                timestamp: Utc::now(),
                level,
                category: category.into(),
                event_id: 0,
                event_name: None,
                message: String::new(),
                properties: Vec::new(),
                scopes: Vec::new(),
                errors: Vec::new(),
            },
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn event_id(&self) -> i32 {
        self.event_id
    }

    pub fn event_name(&self) -> Option<&str> {
        self.event_name.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Rendered template fields in first-occurrence order, then the raw template.
    pub fn properties(&self) -> &[(String, String)] {
        &self.properties
    }

    /// Value of the first property named `key`.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn scopes(&self) -> &[ScopeEntry] {
        &self.scopes
    }

    pub fn errors(&self) -> &[ErrorEntry] {
        &self.errors
    }
}

/// Builds a [`LoggingEntry`].
#[derive(Debug)]
pub struct LoggingEntryBuilder {
    entry: LoggingEntry,
}

impl LoggingEntryBuilder {
    #[must_use]
    pub fn event(mut self, event: EventId) -> Self {
        self.entry.event_id = event.id;
        self.entry.event_name = event.name;
        self
    }

    #[must_use]
    pub fn message<S: Into<String>>(mut self, message: S) -> Self {
        self.entry.message = message.into();
        self
    }

    #[must_use]
    pub fn properties(mut self, properties: Vec<(String, String)>) -> Self {
        self.entry.properties = properties;
        self
    }

    #[must_use]
    pub fn scopes(mut self, scopes: Vec<ScopeEntry>) -> Self {
        self.entry.scopes = scopes;
        self
    }

    #[must_use]
    pub fn errors(mut self, errors: Vec<ErrorEntry>) -> Self {
        self.entry.errors = errors;
        self
    }

    #[must_use]
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.entry.timestamp = timestamp;
        self
    }

    pub fn build(self) -> LoggingEntry {
        self.entry
    }
}

#[cfg(test)]
mod tests {
    use thiserror::Error;

    use super::*;

    #[derive(Debug, Error)]
    #[error("connection reset")]
    struct Reset;

    #[derive(Debug, Error)]
    #[error("query failed")]
    struct QueryFailed(#[source] Reset);

    #[derive(Debug, Error)]
    #[error("link {0}")]
    struct Cycle(usize, #[source] Option<Box<Cycle>>);

    #[test]
    fn levels_are_ordered() {
        assert!(LogLevel::Trace < LogLevel::Information);
        assert!(LogLevel::Critical < LogLevel::None);
        assert_eq!(LogLevel::Warning.to_string(), "warning");
    }

    #[test]
    fn error_chain_links_sources_by_id() {
        let error = QueryFailed(Reset);
        let chain = ErrorEntry::chain(&error);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].message, "query failed");
        assert_eq!(chain[1].message, "connection reset");
        assert_eq!(chain[0].source_id, Some(chain[1].id));
        assert_eq!(chain[1].source_id, None);
        assert_eq!(chain[1].details, "Reset");
    }

    #[test]
    fn error_chain_is_capped() {
        let mut error = Cycle(0, None);
        for i in 1..40 {
            error = Cycle(i, Some(Box::new(error)));
        }
        let chain = ErrorEntry::chain(&error);
        assert_eq!(chain.len(), MAX_ERROR_DEPTH);
        assert_eq!(chain[0].message, "link 39");
        assert!(chain.last().unwrap().source_id.is_none());
    }

    #[test]
    fn builder_sets_every_field() {
        let entry = LoggingEntry::builder(LogLevel::Error, "orders")
            .event(EventId::new(7).with_name("Checkout"))
            .message("failed")
            .properties(vec![("Order".into(), "42".into())])
            .build();
        assert_eq!(entry.level(), LogLevel::Error);
        assert_eq!(entry.category(), "orders");
        assert_eq!(entry.event_id(), 7);
        assert_eq!(entry.event_name(), Some("Checkout"));
        assert_eq!(entry.message(), "failed");
        assert_eq!(entry.property("Order"), Some("42"));
        assert!(entry.scopes().is_empty());
    }

    #[test]
    fn entry_serializes_to_json() {
        let entry = LoggingEntry::builder(LogLevel::Warning, "auth")
            .message("denied")
            .build();
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["level"], "warning");
        assert_eq!(json["category"], "auth");
        assert_eq!(json["message"], "denied");
    }
}
