//! Per-type format specifiers applied when a field has none.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::value::ValueKind;

/// Specifiers keyed by value kind.
///
/// The defaults render date-times in round-trip form, enumerations as their
/// discriminant, and floats with enough significant digits to round-trip
/// (`G9` for `f32`, `G17` for `f64`).
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormatOverrides {
    specs: HashMap<ValueKind, String>,
}

impl FormatOverrides {
    /// An override table with no entries.
    pub fn empty() -> Self {
        Self {
            specs: HashMap::new(),
        }
    }

    pub fn get(&self, kind: ValueKind) -> Option<&str> {
        self.specs.get(&kind).map(String::as_str)
    }

    /// Sets the specifier for `kind`, returning the previous one.
    pub fn set<S: Into<String>>(&mut self, kind: ValueKind, spec: S) -> Option<String> {
        self.specs.insert(kind, spec.into())
    }

    pub fn remove(&mut self, kind: ValueKind) -> Option<String> {
        self.specs.remove(&kind)
    }

    #[must_use]
    pub fn with<S: Into<String>>(mut self, kind: ValueKind, spec: S) -> Self {
        self.set(kind, spec);
        self
    }
}

impl Default for FormatOverrides {
    fn default() -> Self {
        Self::empty()
            .with(ValueKind::DateTime, "O")
            .with(ValueKind::Enum, "D")
            .with(ValueKind::F32, "G9")
            .with(ValueKind::F64, "G17")
    }
}
