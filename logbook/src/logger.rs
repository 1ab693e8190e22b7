//! Logger façade: turns a log call into a [`LoggingEntry`] and publishes it.

use std::{collections::HashSet, error::Error as StdError, fmt, sync::Arc};

use tracing::debug;

use crate::{
    broker::MessageBroker,
    config::LoggerOptions,
    entry::{ErrorEntry, EventId, LogLevel, LoggingEntry, ScopeEntry},
    error::{Error, FormatError},
    format::{Value, ValueFormatter},
    registry::{SensitiveFieldRegistry, ORIGINAL_FORMAT_KEY},
    template::{MessageTemplate, TemplateCache, NULL_TEMPLATE},
};

/// Accepts finished entries for delivery.
pub trait EntryPublisher: Send + Sync {
    /// Hands `entry` off without waiting. Returns `false` if it was refused.
    fn publish(&self, entry: LoggingEntry) -> bool;
}

impl EntryPublisher for MessageBroker {
    fn publish(&self, entry: LoggingEntry) -> bool {
        self.send_message(entry)
    }
}

struct Shared {
    options: LoggerOptions,
    formatter: ValueFormatter,
    cache: TemplateCache,
    publisher: Arc<dyn EntryPublisher>,
}

/// Creates [`Logger`]s sharing one frozen registry, template cache and publisher.
#[derive(Clone)]
pub struct LoggerFactory {
    shared: Arc<Shared>,
}

impl LoggerFactory {
    /// Freezes `registry` and wires it into every logger this factory creates.
    pub fn new(
        options: LoggerOptions,
        mut registry: SensitiveFieldRegistry,
        publisher: Arc<dyn EntryPublisher>,
    ) -> Result<Self, Error> {
        registry.make_read_only();
        let cache = TemplateCache::new(options.template_cache_capacity)?;
        let formatter = ValueFormatter::new(Arc::new(registry))
            .with_overrides(options.overrides.clone())
            .with_culture(options.culture.clone());
        Ok(Self {
            shared: Arc::new(Shared {
                options,
                formatter,
                cache,
                publisher,
            }),
        })
    }

    pub fn create_logger(&self, category: &str) -> Result<Logger, Error> {
        if category.trim().is_empty() {
            return Err(Error::argument("logger category must not be empty"));
        }
        Ok(Logger {
            shared: Arc::clone(&self.shared),
            category: Arc::from(category),
            scopes: Arc::from(Vec::new()),
        })
    }

    pub fn options(&self) -> &LoggerOptions {
        &self.shared.options
    }

    pub fn formatter(&self) -> &ValueFormatter {
        &self.shared.formatter
    }

    pub fn template_cache(&self) -> &TemplateCache {
        &self.shared.cache
    }
}

impl fmt::Debug for LoggerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerFactory")
            .field("options", &self.shared.options)
            .finish_non_exhaustive()
    }
}

/// Writes entries for one category.
///
/// Cloning is cheap. Scopes added with [`Logger::with_scope`] are carried by
/// the returned logger only.
#[derive(Clone)]
pub struct Logger {
    shared: Arc<Shared>,
    category: Arc<str>,
    scopes: Arc<[ScopeEntry]>,
}

impl Logger {
    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn scopes(&self) -> &[ScopeEntry] {
        &self.scopes
    }

    pub fn is_enabled(&self, level: LogLevel) -> bool {
        let min_level = self.shared.options.min_level;
        level != LogLevel::None && min_level != LogLevel::None && level >= min_level
    }

    /// A logger whose entries also carry the rendered `template` as a scope.
    pub fn with_scope(&self, template: &str, args: &[Value]) -> Result<Logger, Error> {
        let (message, properties) = self.render(Some(template), args)?;
        let mut scopes = self.scopes.to_vec();
        scopes.push(ScopeEntry {
            message,
            properties,
        });
        Ok(Logger {
            shared: Arc::clone(&self.shared),
            category: Arc::clone(&self.category),
            scopes: Arc::from(scopes),
        })
    }

    /// Builds the entry for a log call without publishing it.
    ///
    /// A `None` template renders as `[null]`.
    pub fn entry(
        &self,
        level: LogLevel,
        event: EventId,
        template: Option<&str>,
        args: &[Value],
        error: Option<&(dyn StdError + 'static)>,
    ) -> Result<LoggingEntry, Error> {
        let (message, properties) = self.render(template, args)?;
        let errors = error.map(ErrorEntry::chain).unwrap_or_default();
        Ok(LoggingEntry::builder(level, self.category.as_ref())
            .event(event)
            .message(message)
            .properties(properties)
            .scopes(self.scopes.to_vec())
            .errors(errors)
            .build())
    }

    /// Formats and publishes one entry.
    ///
    /// Template and specifier errors always surface. A refused hand-off
    /// surfaces as [`Error::Rejected`] unless `suppress_send_errors` is set.
    pub fn log(
        &self,
        level: LogLevel,
        event: EventId,
        template: Option<&str>,
        args: &[Value],
        error: Option<&(dyn StdError + 'static)>,
    ) -> Result<(), Error> {
        if !self.is_enabled(level) {
            return Ok(());
        }
        let entry = self.entry(level, event, template, args, error)?;
        if self.shared.publisher.publish(entry) {
            return Ok(());
        }
        if self.shared.options.suppress_send_errors {
            debug!(category = %self.category, %level, "Logging entry was not accepted");
            Ok(())
        } else {
            Err(Error::Rejected)
        }
    }

    pub fn trace(&self, template: &str, args: &[Value]) -> Result<(), Error> {
        self.log(LogLevel::Trace, EventId::default(), Some(template), args, None)
    }

    pub fn debug(&self, template: &str, args: &[Value]) -> Result<(), Error> {
        self.log(LogLevel::Debug, EventId::default(), Some(template), args, None)
    }

    pub fn information(&self, template: &str, args: &[Value]) -> Result<(), Error> {
        self.log(LogLevel::Information, EventId::default(), Some(template), args, None)
    }

    pub fn warning(&self, template: &str, args: &[Value]) -> Result<(), Error> {
        self.log(LogLevel::Warning, EventId::default(), Some(template), args, None)
    }

    pub fn error(
        &self,
        template: &str,
        args: &[Value],
        error: Option<&(dyn StdError + 'static)>,
    ) -> Result<(), Error> {
        self.log(LogLevel::Error, EventId::default(), Some(template), args, error)
    }

    pub fn critical(
        &self,
        template: &str,
        args: &[Value],
        error: Option<&(dyn StdError + 'static)>,
    ) -> Result<(), Error> {
        self.log(LogLevel::Critical, EventId::default(), Some(template), args, error)
    }

    /// Message text plus properties: each field name once, in first-occurrence
    /// order, then the raw template under [`ORIGINAL_FORMAT_KEY`].
    fn render(
        &self,
        template: Option<&str>,
        args: &[Value],
    ) -> Result<(String, Vec<(String, String)>), Error> {
        let Some(raw) = template else {
            let properties = vec![(ORIGINAL_FORMAT_KEY.to_owned(), NULL_TEMPLATE.to_owned())];
            return Ok((NULL_TEMPLATE.to_owned(), properties));
        };
        let template = self.shared.cache.get_or_parse(raw)?;
        let formatter = &self.shared.formatter;
        let message = formatter.format_template(&template, args)?;
        let properties = properties(formatter, &template, args)?;
        Ok((message, properties))
    }
}

fn properties(
    formatter: &ValueFormatter,
    template: &MessageTemplate,
    args: &[Value],
) -> Result<Vec<(String, String)>, FormatError> {
    let mut seen = HashSet::new();
    let mut properties = Vec::with_capacity(template.segments().len() + 1);
    for segment in template.segments() {
        if !seen.insert(segment.name()) {
            continue;
        }
        let value = args
            .get(segment.index())
            .ok_or(FormatError::MissingArgument {
                index: segment.index(),
                provided: args.len(),
            })?;
        properties.push((
            segment.name().to_owned(),
            formatter.format_segment(value, segment)?,
        ));
    }
    properties.push((ORIGINAL_FORMAT_KEY.to_owned(), template.original().to_owned()));
    Ok(properties)
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("category", &self.category)
            .field("scopes", &self.scopes.len())
            .finish_non_exhaustive()
    }
}
