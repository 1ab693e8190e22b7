//! Positional composite formats.
//!
//! A composite format addresses its arguments by position only:
//! `{index[,alignment][:format]}`, with `{{` and `}}` standing for literal
//! braces. Named templates are normalized into this form before rendering.

use crate::error::FormatError;

/// One positional field of a composite format.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Hole {
    index: usize,
    alignment: i32,
    format: Option<String>,
    offset: usize,
}

impl Hole {
    /// Position of the argument this field renders.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Minimum width; positive right-aligns, negative left-aligns.
    pub fn alignment(&self) -> i32 {
        self.alignment
    }

    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    /// Byte offset of the opening brace in the format string.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Piece {
    Literal(String),
    Hole(Hole),
}

/// A parsed positional format string.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CompositeFormat {
    format: String,
    pieces: Vec<Piece>,
    minimum_argument_count: usize,
}

impl CompositeFormat {
    /// Parses a positional format string.
    pub fn parse(format: &str) -> Result<Self, FormatError> {
        let bytes = format.as_bytes();
        let mut pieces = Vec::new();
        let mut literal = String::new();
        let mut minimum_argument_count = 0;
        let mut pos = 0;

        while pos < bytes.len() {
            match bytes[pos] {
                b'{' if bytes.get(pos + 1) == Some(&b'{') => {
                    literal.push('{');
                    pos += 2;
                }
                b'}' if bytes.get(pos + 1) == Some(&b'}') => {
                    literal.push('}');
                    pos += 2;
                }
                b'}' => {
                    return Err(FormatError::UnbalancedBrace {
                        brace: '}',
                        offset: pos,
                    });
                }
                b'{' => {
                    let close = find_field_end(format, pos)?;
                    let hole = parse_hole(&format[pos + 1..close], pos)?;
                    minimum_argument_count = minimum_argument_count.max(hole.index + 1);
                    if !literal.is_empty() {
                        pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                    }
                    pieces.push(Piece::Hole(hole));
                    pos = close + 1;
                }
                _ => {
                    let next = format[pos..]
                        .find(is_brace)
                        .map_or(bytes.len(), |found| pos + found);
                    literal.push_str(&format[pos..next]);
                    pos = next;
                }
            }
        }

        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }

        Ok(Self {
            format: format.to_owned(),
            pieces,
            minimum_argument_count,
        })
    }

    /// The positional format string this was parsed from.
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Fields in the order they appear.
    pub fn holes(&self) -> impl Iterator<Item = &Hole> + '_ {
        self.pieces.iter().filter_map(|piece| match piece {
            Piece::Hole(hole) => Some(hole),
            Piece::Literal(_) => None,
        })
    }

    /// Number of arguments a render needs: one past the highest index.
    pub fn minimum_argument_count(&self) -> usize {
        self.minimum_argument_count
    }

    /// Renders the format, asking `hole_text` for each field's text.
    ///
    /// `hole_text` receives the field's ordinal (its position among all
    /// fields) and the field itself. Alignment is applied to the returned text.
    pub(crate) fn render<E, F>(&self, mut hole_text: F) -> Result<String, E>
    where
        F: FnMut(usize, &Hole) -> Result<String, E>,
    {
        let mut out = String::with_capacity(self.format.len());
        let mut ordinal = 0;
        for piece in &self.pieces {
            match piece {
                Piece::Literal(text) => out.push_str(text),
                Piece::Hole(hole) => {
                    let text = hole_text(ordinal, hole)?;
                    ordinal += 1;
                    pad_into(&mut out, &text, hole.alignment);
                }
            }
        }
        Ok(out)
    }
}

/// The pieces of a field body: `name[,alignment][:format]`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct FieldParts<'a> {
    pub(crate) name: &'a str,
    pub(crate) alignment: Option<&'a str>,
    pub(crate) format: Option<&'a str>,
    /// Everything after the name, verbatim.
    pub(crate) rest: &'a str,
}

pub(crate) fn split_field(body: &str) -> FieldParts<'_> {
    let name_end = body.find([',', ':']).unwrap_or(body.len());
    let name = &body[..name_end];
    let rest = &body[name_end..];

    let (alignment, format) = if let Some(after) = rest.strip_prefix(',') {
        match after.find(':') {
            Some(colon) => (Some(&after[..colon]), Some(&after[colon + 1..])),
            None => (Some(after), None),
        }
    } else if let Some(after) = rest.strip_prefix(':') {
        (None, Some(after))
    } else {
        (None, None)
    };

    FieldParts {
        name,
        alignment,
        format: format.filter(|spec| !spec.is_empty()),
        rest,
    }
}

pub(crate) fn parse_alignment(text: Option<&str>, offset: usize) -> Result<i32, FormatError> {
    match text {
        None => Ok(0),
        Some(text) => text
            .trim()
            .parse::<i32>()
            .map_err(|_| FormatError::InvalidAlignment {
                alignment: text.to_owned(),
                offset,
            }),
    }
}

/// Finds the `}` closing the field opened at `open`.
pub(crate) fn find_field_end(template: &str, open: usize) -> Result<usize, FormatError> {
    let body_start = open + 1;
    match template[body_start..].find(is_brace) {
        Some(found) if template.as_bytes()[body_start + found] == b'}' => Ok(body_start + found),
        _ => Err(FormatError::UnbalancedBrace {
            brace: '{',
            offset: open,
        }),
    }
}

/// Parses a positional index no larger than `i32::MAX`.
pub(crate) fn parse_index(text: &str, offset: usize) -> Result<usize, FormatError> {
    let out_of_range = || FormatError::IndexOutOfRange {
        index: text.to_owned(),
        offset,
    };
    if is_ascii_digits(text) {
        let index = text.parse::<u64>().map_err(|_| out_of_range())?;
        if index > i32::MAX as u64 {
            return Err(out_of_range());
        }
        usize::try_from(index).map_err(|_| out_of_range())
    } else if text.strip_prefix('-').is_some_and(is_ascii_digits) {
        Err(out_of_range())
    } else {
        Err(FormatError::InvalidIndex {
            index: text.to_owned(),
            offset,
        })
    }
}

pub(crate) fn is_ascii_digits(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

fn parse_hole(body: &str, offset: usize) -> Result<Hole, FormatError> {
    let parts = split_field(body);
    let index_text = parts.name.trim();
    if index_text.is_empty() {
        return Err(FormatError::EmptyName { offset });
    }
    Ok(Hole {
        index: parse_index(index_text, offset)?,
        alignment: parse_alignment(parts.alignment, offset)?,
        format: parts.format.map(str::to_owned),
        offset,
    })
}

fn is_brace(c: char) -> bool {
    c == '{' || c == '}'
}

/// Appends `text` padded with spaces to `alignment` characters.
fn pad_into(out: &mut String, text: &str, alignment: i32) {
    let width = alignment.unsigned_abs() as usize;
    let len = text.chars().count();
    if len >= width {
        out.push_str(text);
    } else if alignment > 0 {
        out.extend(std::iter::repeat(' ').take(width - len));
        out.push_str(text);
    } else {
        out.push_str(text);
        out.extend(std::iter::repeat(' ').take(width - len));
    }
}
