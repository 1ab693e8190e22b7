//! Template parsing.
//!
//! - [`CompositeFormat`]: positional formats (`"{1} {0}"`).
//! - [`MessageTemplate`]: named or positional templates normalized into a
//!   composite format plus per-field [`Segment`]s.
//! - [`TemplateCache`]: a bounded cache shared by the loggers of one factory.

mod cache;
mod composite;
mod parser;

pub use cache::{TemplateCache, DEFAULT_TEMPLATE_CACHE_CAPACITY};
pub use composite::{CompositeFormat, Hole};
pub use parser::{MessageTemplate, Segment, NULL_TEMPLATE, SERIALIZE_MARKER};
