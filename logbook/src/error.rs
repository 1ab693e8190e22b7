//! Error taxonomy.
//!
//! Template and format-spec failures are [`FormatError`]s and always surface at
//! the call site. Everything else the public API can refuse is an [`Error`].
//! Failures raised while a handler runs are [`HandlerError`]s; the broker
//! catches them and never hands them back to the producer.

use thiserror::Error;

/// Failures while parsing a template or rendering a value.
///
/// Offsets are byte offsets into the raw template and point at the opening
/// brace of the offending field.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum FormatError {
    #[error("Unbalanced `{brace}` at offset {offset}")]
    UnbalancedBrace { brace: char, offset: usize },

    #[error("Field at offset {offset} has an empty name")]
    EmptyName { offset: usize },

    #[error(
        "Field `{name}` at offset {offset} mixes positional and named fields in one template"
    )]
    MixedNaming { name: String, offset: usize },

    #[error("Field index `{index}` at offset {offset} is out of range")]
    IndexOutOfRange { index: String, offset: usize },

    #[error("Field index `{index}` at offset {offset} is not a number")]
    InvalidIndex { index: String, offset: usize },

    #[error("Field at offset {offset} has an invalid alignment `{alignment}`")]
    InvalidAlignment { alignment: String, offset: usize },

    #[error("Positional form of the template disagrees with its fields at offset {offset}")]
    Inconsistent { offset: usize },

    #[error("Format specifier `{spec}` is not supported for values of type `{type_name}`")]
    UnsupportedSpec { spec: String, type_name: String },

    #[error("Field index {index} requires at least {} arguments, got {provided}", .index + 1)]
    MissingArgument { index: usize, provided: usize },
}

/// Errors returned by registry, broker and logger operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error("Operation is not valid in the current state: {0}")]
    OperationInvalid(String),

    #[error("The broker did not accept the message")]
    Rejected,

    #[error("The operation was cancelled")]
    Cancelled,
}

impl Error {
    pub(crate) fn argument<S: Into<String>>(msg: S) -> Self {
        Error::Argument(msg.into())
    }

    pub(crate) fn operation_invalid<S: Into<String>>(msg: S) -> Self {
        Error::OperationInvalid(msg.into())
    }
}

/// Failure raised by a handler while processing a message.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl HandlerError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
