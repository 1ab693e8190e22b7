//! Shared cache of parsed templates.

use std::sync::Arc;

use dashmap::DashMap;

use super::MessageTemplate;
use crate::error::{Error, FormatError};

/// Templates kept before the cache stops inserting.
pub const DEFAULT_TEMPLATE_CACHE_CAPACITY: usize = 1024;

/// A bounded, concurrency-safe map from raw template text to its parse.
///
/// Once `capacity` templates are cached, further templates are parsed on
/// every call and never inserted. Nothing is evicted.
#[derive(Debug)]
pub struct TemplateCache {
    templates: DashMap<String, Arc<MessageTemplate>>,
    capacity: usize,
}

impl TemplateCache {
    pub fn new(capacity: usize) -> Result<Self, Error> {
        if capacity == 0 {
            return Err(Error::argument("template cache capacity must be positive"));
        }
        Ok(Self {
            templates: DashMap::new(),
            capacity,
        })
    }

    /// Returns the cached parse of `template`, parsing it on a miss.
    ///
    /// Parse failures are never cached.
    pub fn get_or_parse(&self, template: &str) -> Result<Arc<MessageTemplate>, FormatError> {
        if let Some(found) = self.templates.get(template) {
            return Ok(Arc::clone(found.value()));
        }

        let parsed = Arc::new(MessageTemplate::parse(template)?);
        if self.templates.len() < self.capacity {
            // Another caller may have raced us here; keep whichever landed first.
            let entry = self
                .templates
                .entry(template.to_owned())
                .or_insert_with(|| Arc::clone(&parsed));
            return Ok(Arc::clone(entry.value()));
        }
        Ok(parsed)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for TemplateCache {
    fn default() -> Self {
        Self {
            templates: DashMap::new(),
            capacity: DEFAULT_TEMPLATE_CACHE_CAPACITY,
        }
    }
}
