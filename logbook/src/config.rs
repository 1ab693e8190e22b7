//! Options the host binds from configuration.
//!
//! Every struct deserializes with kebab-case keys and falls back to its
//! [`Default`] for missing keys, so a host can bind them from any `serde`
//! format.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    broker::FullMode,
    error::Error,
    format::{Culture, FormatOverrides},
    registry::{FieldKind, SensitiveFieldRegistry},
    template::DEFAULT_TEMPLATE_CACHE_CAPACITY,
    LogLevel,
};

/// Logger behavior.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct LoggerOptions {
    /// Calls below this level are discarded before formatting.
    pub min_level: LogLevel,
    /// When set, a refused hand-off to the broker is logged and swallowed.
    pub suppress_send_errors: bool,
    /// Templates kept parsed across calls.
    pub template_cache_capacity: usize,
    /// Specifiers used when a field has none.
    pub overrides: FormatOverrides,
    pub culture: Culture,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            min_level: LogLevel::default(),
            suppress_send_errors: true,
            template_cache_capacity: DEFAULT_TEMPLATE_CACHE_CAPACITY,
            overrides: FormatOverrides::default(),
            culture: Culture::default(),
        }
    }
}

/// Broker queue sizing.
///
/// `capacity: None` is unbounded and never applies `full_mode`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct QueueOptions {
    pub capacity: Option<usize>,
    pub full_mode: FullMode,
}

impl QueueOptions {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn bounded(capacity: usize, full_mode: FullMode) -> Self {
        Self {
            capacity: Some(capacity),
            full_mode,
        }
    }
}

/// Broker wiring read by the host.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BrokerOptions {
    pub queue: QueueOptions,
    /// How long `stop` keeps accepting messages before closing the queue.
    pub drain_delay_ms: u64,
}

impl BrokerOptions {
    pub fn drain_delay(&self) -> Duration {
        Duration::from_millis(self.drain_delay_ms)
    }
}

impl Default for BrokerOptions {
    fn default() -> Self {
        Self {
            queue: QueueOptions::default(),
            drain_delay_ms: 100,
        }
    }
}

/// Registry contents bound from configuration.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RegistryOptions {
    pub segments: Vec<String>,
    pub dictionary_keys: Vec<String>,
    pub summaries: Vec<String>,
}

impl RegistryOptions {
    /// Builds a writable registry holding every listed name.
    pub fn build(&self) -> Result<SensitiveFieldRegistry, Error> {
        let mut registry = SensitiveFieldRegistry::new();
        let groups = [
            (FieldKind::Segment, &self.segments),
            (FieldKind::DictionaryKey, &self.dictionary_keys),
            (FieldKind::Summary, &self.summaries),
        ];
        for (kind, names) in groups {
            for name in names {
                registry.add(kind, name)?;
            }
        }
        Ok(registry)
    }
}
