//! Named message templates.
//!
//! A message template names its fields (`"User {UserId} logged in"`) or
//! addresses them by position (`"{1} before {0}"`), never both. Parsing
//! rewrites every field name to a numeric index, producing a composite format
//! plus one [`Segment`] per field occurrence.

use std::fmt;

use super::composite::{
    find_field_end, is_ascii_digits, parse_alignment, parse_index, split_field, CompositeFormat,
};
use crate::error::FormatError;

/// Leading marker asking for an object's fields to be rendered.
pub const SERIALIZE_MARKER: char = '@';

/// Message recorded when a call carries no template.
pub const NULL_TEMPLATE: &str = "[null]";

/// Index a negative-looking name may use without being rejected.
const SENTINEL_INDEX: &str = "-1";

/// One field occurrence within a template.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Segment {
    name: String,
    index: usize,
    alignment: i32,
    format: Option<String>,
    serialize: bool,
    offset: usize,
}

impl Segment {
    /// Field name as written, without the serialize marker.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Argument position this field reads.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn alignment(&self) -> i32 {
        self.alignment
    }

    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    /// Whether the field carried the `@` marker.
    pub fn serialize(&self) -> bool {
        self.serialize
    }

    /// Byte offset of the field's opening brace in the raw template.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Naming {
    Positional,
    Named,
}

/// A parsed, position-addressed message template.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MessageTemplate {
    original: String,
    segments: Vec<Segment>,
    composite: CompositeFormat,
}

impl MessageTemplate {
    /// Parses `template`, resolving field names to argument positions.
    pub fn parse(template: &str) -> Result<Self, FormatError> {
        let bytes = template.as_bytes();
        let mut positional = String::with_capacity(template.len());
        let mut segments = Vec::new();
        let mut names: Vec<&str> = Vec::new();
        let mut naming: Option<Naming> = None;
        let mut pos = 0;

        while pos < bytes.len() {
            let byte = bytes[pos];
            if byte != b'{' && byte != b'}' {
                let next = template[pos..]
                    .find(['{', '}'])
                    .map_or(bytes.len(), |found| pos + found);
                positional.push_str(&template[pos..next]);
                pos = next;
                continue;
            }

            let run = bytes[pos..].iter().take_while(|&&b| b == byte).count();
            if run % 2 == 0 {
                positional.push_str(&template[pos..pos + run]);
                pos += run;
                continue;
            }
            if byte == b'}' {
                return Err(FormatError::UnbalancedBrace {
                    brace: '}',
                    offset: pos + run - 1,
                });
            }

            // Odd run of `{`: the last one opens a field.
            let open = pos + run - 1;
            positional.push_str(&template[pos..open]);
            let close = find_field_end(template, open)?;
            let body = &template[open + 1..close];
            let (serialize, body) = match body.strip_prefix(SERIALIZE_MARKER) {
                Some(stripped) => (true, stripped),
                None => (false, body),
            };

            let parts = split_field(body);
            let name = parts.name.trim();
            if name.is_empty() {
                return Err(FormatError::EmptyName { offset: open });
            }

            let field_naming = if is_numeric_name(name) {
                Naming::Positional
            } else {
                Naming::Named
            };
            match naming {
                Some(existing) if existing != field_naming => {
                    return Err(FormatError::MixedNaming {
                        name: name.to_owned(),
                        offset: open,
                    });
                }
                _ => naming = Some(field_naming),
            }

            let index = match field_naming {
                Naming::Positional => parse_index(name, open)?,
                Naming::Named => match names.iter().position(|known| *known == name) {
                    Some(index) => index,
                    None => {
                        names.push(name);
                        names.len() - 1
                    }
                },
            };

            segments.push(Segment {
                name: name.to_owned(),
                index,
                alignment: parse_alignment(parts.alignment, open)?,
                format: parts.format.map(str::to_owned),
                serialize,
                offset: open,
            });

            positional.push('{');
            positional.push_str(&index.to_string());
            positional.push_str(parts.rest);
            positional.push('}');
            pos = close + 1;
        }

        let composite = CompositeFormat::parse(&positional)?;
        check_consistency(&composite, &segments)?;

        Ok(Self {
            original: template.to_owned(),
            segments,
            composite,
        })
    }

    /// The template as the caller wrote it.
    pub fn original(&self) -> &str {
        &self.original
    }

    /// The template with every field name replaced by its index.
    pub fn positional_format(&self) -> &str {
        self.composite.format()
    }

    /// Field occurrences in template order, duplicates included.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn composite(&self) -> &CompositeFormat {
        &self.composite
    }

    /// Arguments a render needs.
    pub fn minimum_argument_count(&self) -> usize {
        self.composite.minimum_argument_count()
    }
}

impl fmt::Display for MessageTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

/// Digits, or a minus sign followed by digits other than the `-1` sentinel.
fn is_numeric_name(name: &str) -> bool {
    if is_ascii_digits(name) {
        return true;
    }
    name != SENTINEL_INDEX && name.strip_prefix('-').is_some_and(is_ascii_digits)
}

fn check_consistency(composite: &CompositeFormat, segments: &[Segment]) -> Result<(), FormatError> {
    let mut holes = composite.holes();
    for segment in segments {
        let matches = holes.next().is_some_and(|hole| {
            hole.index() == segment.index
                && hole.alignment() == segment.alignment
                && hole.format() == segment.format.as_deref()
        });
        if !matches {
            return Err(FormatError::Inconsistent {
                offset: segment.offset,
            });
        }
    }
    match holes.next() {
        Some(extra) => Err(FormatError::Inconsistent {
            offset: extra.offset(),
        }),
        None => Ok(()),
    }
}
