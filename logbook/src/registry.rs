//! Registry of field names whose values must not be rendered in clear text.
//!
//! Names are grouped by [`FieldKind`]:
//!
//! | Kind | Matches | Effect |
//! |------|---------|--------|
//! | `Segment` | template field names, serialized object fields | `[Redacted]` |
//! | `DictionaryKey` | keys of mapping values | entry value becomes `[Redacted]` |
//! | `Summary` | template field names, serialized object fields | `[*N T*]` for bytes and primitive sequences |
//!
//! A registry is built, frozen with [`SensitiveFieldRegistry::make_read_only`]
//! and then shared. Every mutator fails on a frozen registry.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Property key under which every entry records its raw template.
///
/// This key can never be registered.
pub const ORIGINAL_FORMAT_KEY: &str = "{OriginalFormat}";

/// What a registered name refers to.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldKind {
    /// A template field name or serialized object field.
    Segment,
    /// A key inside a mapping value.
    DictionaryKey,
    /// A field whose collection values collapse to a length summary.
    Summary,
}

/// Names, by kind, whose values are redacted or summarized.
///
/// Comparisons are case-sensitive.
#[derive(Clone, Debug, Default)]
pub struct SensitiveFieldRegistry {
    names: HashMap<FieldKind, HashSet<String>>,
    read_only: bool,
}

impl SensitiveFieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name` under `kind`. Returns `false` if it was already present.
    ///
    /// The reserved [`ORIGINAL_FORMAT_KEY`] is ignored and reported as not added.
    pub fn add(&mut self, kind: FieldKind, name: &str) -> Result<bool, Error> {
        self.ensure_writable()?;
        ensure_name(name)?;
        if name == ORIGINAL_FORMAT_KEY {
            return Ok(false);
        }
        Ok(self.names.entry(kind).or_default().insert(name.to_owned()))
    }

    /// Unregisters `name` under `kind`. Returns `false` if it was not present.
    pub fn remove(&mut self, kind: FieldKind, name: &str) -> Result<bool, Error> {
        self.ensure_writable()?;
        ensure_name(name)?;
        Ok(self
            .names
            .get_mut(&kind)
            .is_some_and(|names| names.remove(name)))
    }

    pub fn contains(&self, kind: FieldKind, name: &str) -> bool {
        self.names
            .get(&kind)
            .is_some_and(|names| names.contains(name))
    }

    pub fn clear(&mut self) -> Result<(), Error> {
        self.ensure_writable()?;
        self.names.clear();
        Ok(())
    }

    /// Adds every name of this registry to `other`.
    ///
    /// Fails when `other` is read-only. Names already in `other` stay.
    pub fn copy_to(&self, other: &mut SensitiveFieldRegistry) -> Result<(), Error> {
        other.ensure_writable()?;
        for (kind, names) in &self.names {
            other
                .names
                .entry(*kind)
                .or_default()
                .extend(names.iter().cloned());
        }
        Ok(())
    }

    /// Freezes the registry. Freezing twice is a no-op.
    pub fn make_read_only(&mut self) {
        self.read_only = true;
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Number of registered names under `kind`.
    pub fn len(&self, kind: FieldKind) -> usize {
        self.names.get(&kind).map_or(0, HashSet::len)
    }

    pub fn is_empty(&self) -> bool {
        self.names.values().all(HashSet::is_empty)
    }

    fn ensure_writable(&self) -> Result<(), Error> {
        if self.read_only {
            return Err(Error::operation_invalid(
                "the sensitive field registry is read-only",
            ));
        }
        Ok(())
    }
}

fn ensure_name(name: &str) -> Result<(), Error> {
    if name.is_empty() {
        return Err(Error::argument("field name must not be empty"));
    }
    Ok(())
}
