//! Structured logging entries with redaction-aware formatting and async delivery.
//!
//! A log call is a message template, positional arguments, an optional error
//! and the scopes of the logger it was made on. This crate turns that call into
//! a [`LoggingEntry`] and hands it to a [`MessageBroker`], which delivers it to
//! storage on a background task.
//!
//! The pieces, leaf first:
//! - **Templates**: [`MessageTemplate`] parses `{Name,alignment:spec}` and
//!   `{0}` templates into a positional [`CompositeFormat`] plus [`Segment`]s.
//!   [`TemplateCache`] keeps hot templates parsed.
//! - **Registry**: [`SensitiveFieldRegistry`] lists field names, by
//!   [`FieldKind`], whose values are redacted or summarized. It is frozen
//!   before it is shared.
//! - **Formatting**: [`ValueFormatter`] renders captured [`Value`]s with
//!   per-type rules, explicit specifiers, [`FormatOverrides`] and the
//!   registry.
//! - **Delivery**: [`MessageBroker`] routes typed messages from any number of
//!   producers to handlers through one consumer task, isolating handler
//!   failures.
//! - **Entries**: [`LoggerFactory`] and [`Logger`] compose the above;
//!   [`EntryStore`] implementations persist what the broker delivers.
//!
//! Key rules:
//! - Template and specifier errors surface at the call site as [`FormatError`].
//! - Persistence failures never reach the caller; they end at the broker's
//!   handler boundary and are reported to its diagnostic observer.
//! - Values are redacted by field name, never by inspecting their content.
//!
//! What this crate does not do:
//! - configure a `tracing` subscriber (it only emits its own diagnostics)
//! - guarantee exactly-once delivery to storage
//! - query persisted entries
//!
//! `#[derive(ToValue)]` lives in `logbook-derive` and is re-exported here.

// <https://doc.rust-lang.org/rustc/lints/listing/allowed-by-default.html>
#![warn(
    anonymous_parameters,
    bare_trait_objects,
    elided_lifetimes_in_paths,
    missing_copy_implementations,
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unsafe_code,
    unused_extern_crates,
    unused_import_braces
)]
// <https://rust-lang.github.io/rust-clippy/stable>
#![warn(
    clippy::all,
    clippy::cargo,
    clippy::dbg_macro,
    clippy::float_cmp_const,
    clippy::get_unwrap,
    clippy::mem_forget,
    clippy::nursery,
    clippy::pedantic,
    clippy::todo,
    clippy::unwrap_used,
    clippy::uninlined_format_args
)]
// Allow some clippy lints
#![allow(
    clippy::default_trait_access,
    clippy::doc_markdown,
    clippy::if_not_else,
    clippy::module_name_repetitions,
    clippy::multiple_crate_versions,
    clippy::must_use_candidate,
    clippy::needless_pass_by_value,
    clippy::use_self,
    clippy::cargo_common_metadata,
    clippy::missing_errors_doc,
    clippy::enum_glob_use,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::result_large_err,
    clippy::future_not_send,
    clippy::option_if_let_else,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::len_without_is_empty
)]
// Allow some lints while testing
#![cfg_attr(test, allow(clippy::non_ascii_literal, clippy::unwrap_used))]

pub use logbook_derive::ToValue;

#[allow(unused_extern_crates)]
extern crate self as logbook;

// Module declarations
mod broker;
mod config;
mod entry;
mod error;
mod format;
mod logger;
mod registry;
#[cfg(feature = "slog")]
pub mod slog;
mod store;
mod template;

// Re-exports
pub use broker::{
    fallback_fn, handler_fn, BrokerBuilder, BrokerState, DispatchStrategy, DropObserver,
    Envelope, FallbackFn, FallbackHandler, FullMode, HandlerErrorObserver, HandlerFailure,
    HandlerFn, MessageBroker, MessageHandler,
};
pub use config::{BrokerOptions, LoggerOptions, QueueOptions, RegistryOptions};
pub use entry::{
    ErrorEntry, EventId, LogLevel, LoggingEntry, LoggingEntryBuilder, ScopeEntry,
    MAX_ERROR_DEPTH,
};
pub use error::{Error, FormatError, HandlerError};
pub use format::{
    Culture, EnumValue, FormatOverrides, LogFields, LogFormattable, ObjectValue, Rendering,
    ToValue, Value, ValueFormatter, ValueKind, EMPTY_COLLECTION, NULL_VALUE, REDACTED,
    SERIALIZE_SPEC,
};
pub use logger::{EntryPublisher, Logger, LoggerFactory};
pub use registry::{FieldKind, SensitiveFieldRegistry, ORIGINAL_FORMAT_KEY};
pub use store::{EntryStore, MemoryStore, StoreError, StoreHandler};
pub use template::{
    CompositeFormat, Hole, MessageTemplate, Segment, TemplateCache,
    DEFAULT_TEMPLATE_CACHE_CAPACITY, NULL_TEMPLATE, SERIALIZE_MARKER,
};
