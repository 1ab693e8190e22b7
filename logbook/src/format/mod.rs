//! Redaction-aware value formatting.
//!
//! [`ValueFormatter`] turns captured [`Value`]s into text. Which values are
//! redacted is decided by the caller through [`Rendering`]; the formatter only
//! consults the registry itself for the parts of a value it walks into
//! (mapping keys, serialized object fields).
//!
//! Without an explicit specifier, a value is rendered with:
//! 1. the per-kind specifier from [`FormatOverrides`], if any;
//! 2. its own [`LogFormattable`] rendering, if it has one;
//! 3. the default rendering for its kind.

mod numeric;
mod overrides;
mod temporal;
mod value;

use std::sync::Arc;

pub use numeric::Culture;
pub use overrides::FormatOverrides;
pub use value::{
    EnumValue, LogFields, LogFormattable, ObjectValue, ToValue, Value, ValueKind,
};

use numeric::Float;

use crate::{
    error::FormatError,
    registry::{FieldKind, SensitiveFieldRegistry},
    template::{CompositeFormat, MessageTemplate, Segment},
};

/// Rendered in place of a sensitive value.
pub const REDACTED: &str = "[Redacted]";
/// Rendered for a null value.
pub const NULL_VALUE: &str = "(null)";
/// Rendered for an empty sequence or mapping.
pub const EMPTY_COLLECTION: &str = "[]";
/// Explicit specifier selecting serialize mode.
pub const SERIALIZE_SPEC: &str = "@";

/// How a single value is rendered.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Rendering {
    #[default]
    Plain,
    /// `[Redacted]`, or `[*N u8*]` for bytes.
    Redact,
    /// `[*N T*]` for bytes and sequences of one primitive type.
    Summarize,
}

/// Formats values against a frozen [`SensitiveFieldRegistry`].
///
/// Formatting is pure: the same value, specifier and registry always produce
/// the same text.
#[derive(Clone, Debug)]
pub struct ValueFormatter {
    registry: Arc<SensitiveFieldRegistry>,
    overrides: FormatOverrides,
    culture: Culture,
}

impl ValueFormatter {
    pub fn new(registry: Arc<SensitiveFieldRegistry>) -> Self {
        Self {
            registry,
            overrides: FormatOverrides::default(),
            culture: Culture::invariant(),
        }
    }

    #[must_use]
    pub fn with_overrides(mut self, overrides: FormatOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    #[must_use]
    pub fn with_culture(mut self, culture: Culture) -> Self {
        self.culture = culture;
        self
    }

    pub fn registry(&self) -> &SensitiveFieldRegistry {
        &self.registry
    }

    pub fn overrides(&self) -> &FormatOverrides {
        &self.overrides
    }

    pub fn culture(&self) -> &Culture {
        &self.culture
    }

    /// How a field named `name` is rendered under the current registry.
    pub fn rendering_for(&self, name: &str) -> Rendering {
        if self.registry.contains(FieldKind::Segment, name) {
            Rendering::Redact
        } else if self.registry.contains(FieldKind::Summary, name) {
            Rendering::Summarize
        } else {
            Rendering::Plain
        }
    }

    /// Formats one value. The specifier `"@"` selects serialize mode.
    pub fn format(
        &self,
        value: &Value,
        spec: Option<&str>,
        rendering: Rendering,
    ) -> Result<String, FormatError> {
        match spec {
            Some(SERIALIZE_SPEC) => self.render(value, None, rendering, true),
            other => self.render(value, other, rendering, false),
        }
    }

    /// Formats the value of one template field, redacting by field name.
    pub fn format_segment(&self, value: &Value, segment: &Segment) -> Result<String, FormatError> {
        let rendering = self.rendering_for(segment.name());
        match segment.format() {
            Some(SERIALIZE_SPEC) => self.render(value, None, rendering, true),
            spec => self.render(value, spec, rendering, segment.serialize()),
        }
    }

    /// Renders `template` with `args`, redacting each field by name.
    pub fn format_template(
        &self,
        template: &MessageTemplate,
        args: &[Value],
    ) -> Result<String, FormatError> {
        ensure_arguments(template.minimum_argument_count(), args.len())?;
        let segments = template.segments();
        template.composite().render(|ordinal, hole| {
            let segment = segments
                .get(ordinal)
                .ok_or(FormatError::Inconsistent {
                    offset: hole.offset(),
                })?;
            self.format_segment(argument(args, hole.index())?, segment)
        })
    }

    /// Renders a positional format with no redaction.
    pub fn format_composite(
        &self,
        format: &CompositeFormat,
        args: &[Value],
    ) -> Result<String, FormatError> {
        ensure_arguments(format.minimum_argument_count(), args.len())?;
        format.render(|_, hole| {
            self.format(argument(args, hole.index())?, hole.format(), Rendering::Plain)
        })
    }

    fn render(
        &self,
        value: &Value,
        spec: Option<&str>,
        rendering: Rendering,
        serialize: bool,
    ) -> Result<String, FormatError> {
        match rendering {
            Rendering::Redact => {
                return Ok(match value {
                    Value::Bytes(bytes) => summary(bytes.len(), ValueKind::U8.type_name()),
                    _ => REDACTED.to_owned(),
                });
            }
            Rendering::Summarize => {
                if let Some(text) = summarize(value) {
                    return Ok(text);
                }
            }
            Rendering::Plain => {}
        }

        match value {
            Value::Null => Ok(NULL_VALUE.to_owned()),
            Value::Map(entries) => self.render_map(entries, spec, serialize),
            Value::Seq(items) => self.render_list(items.iter(), spec, serialize),
            Value::Bytes(bytes) => {
                let items: Vec<Value> = bytes.iter().copied().map(Value::U8).collect();
                self.render_list(items.iter(), spec, serialize)
            }
            Value::Object(object) if serialize => self.render_object(object),
            scalar => self.render_scalar(scalar, spec),
        }
    }

    fn render_list<'a, I>(
        &self,
        items: I,
        spec: Option<&str>,
        serialize: bool,
    ) -> Result<String, FormatError>
    where
        I: ExactSizeIterator<Item = &'a Value>,
    {
        if items.len() == 0 {
            return Ok(EMPTY_COLLECTION.to_owned());
        }
        let rendered = items
            .map(|item| self.render(item, spec, Rendering::Plain, serialize))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(format!("[{}]", rendered.join(", ")))
    }

    /// `[[k1, v1], [k2, v2]]`; values under registered dictionary keys are
    /// redacted.
    fn render_map(
        &self,
        entries: &[(Value, Value)],
        spec: Option<&str>,
        serialize: bool,
    ) -> Result<String, FormatError> {
        if entries.is_empty() {
            return Ok(EMPTY_COLLECTION.to_owned());
        }
        let mut rendered = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let key_text = self.render(key, None, Rendering::Plain, false)?;
            let rendering = if self.registry.contains(FieldKind::DictionaryKey, &key_text) {
                Rendering::Redact
            } else {
                Rendering::Plain
            };
            let value_text = self.render(value, spec, rendering, serialize)?;
            rendered.push(format!("[{key_text}, {value_text}]"));
        }
        Ok(format!("[{}]", rendered.join(", ")))
    }

    /// `{ P1 = v1, P2 = v2 }`, each field redacted by its own name.
    fn render_object(&self, object: &ObjectValue) -> Result<String, FormatError> {
        if object.fields.is_empty() {
            return Ok("{ }".to_owned());
        }
        let mut rendered = Vec::with_capacity(object.fields.len());
        for (name, value) in &object.fields {
            let text = self.render(value, None, self.rendering_for(name), true)?;
            rendered.push(format!("{name} = {text}"));
        }
        Ok(format!("{{ {} }}", rendered.join(", ")))
    }

    fn render_scalar(&self, value: &Value, spec: Option<&str>) -> Result<String, FormatError> {
        let spec = spec.or_else(|| self.overrides.get(value.kind()));
        let culture = &self.culture;

        let Some(spec) = spec else {
            return Ok(match value {
                Value::Bool(b) => b.to_string(),
                Value::Char(c) => c.to_string(),
                Value::Str(s) => s.clone(),
                Value::F32(v) => numeric::float_default(Float::Single(*v), culture),
                Value::F64(v) => numeric::float_default(Float::Double(*v), culture),
                Value::DateTime(dt) => temporal::date_time_default(dt),
                Value::Enum(e) => e.name.to_owned(),
                Value::Object(object) => object
                    .display
                    .clone()
                    .unwrap_or_else(|| object.type_name.to_owned()),
                Value::Custom(custom) => custom.format_log(None, culture),
                other => match integer_parts(other) {
                    Some((int, _)) => numeric::integer_default(int, culture),
                    None => NULL_VALUE.to_owned(),
                },
            });
        };

        let formatted = match value {
            Value::F32(v) => numeric::format_float(Float::Single(*v), spec, culture),
            Value::F64(v) => numeric::format_float(Float::Double(*v), spec, culture),
            Value::DateTime(dt) => temporal::format_date_time(dt, spec),
            Value::Enum(e) => temporal::format_enum(e, spec),
            Value::Custom(custom) => Some(custom.format_log(Some(spec), culture)),
            other => integer_parts(other)
                .and_then(|(int, bits)| numeric::format_integer(int, bits, spec, culture)),
        };
        formatted.ok_or_else(|| FormatError::UnsupportedSpec {
            spec: spec.to_owned(),
            type_name: value.type_name().to_owned(),
        })
    }
}

fn integer_parts(value: &Value) -> Option<(i128, u32)> {
    Some(match *value {
        Value::I8(v) => (i128::from(v), 8),
        Value::I16(v) => (i128::from(v), 16),
        Value::I32(v) => (i128::from(v), 32),
        Value::I64(v) => (i128::from(v), 64),
        Value::U8(v) => (i128::from(v), 8),
        Value::U16(v) => (i128::from(v), 16),
        Value::U32(v) => (i128::from(v), 32),
        Value::U64(v) => (i128::from(v), 64),
        _ => return None,
    })
}

fn summarize(value: &Value) -> Option<String> {
    match value {
        Value::Bytes(bytes) => Some(summary(bytes.len(), ValueKind::U8.type_name())),
        Value::Seq(items) => {
            let kind = items.first()?.kind();
            (kind.is_primitive() && items.iter().all(|item| item.kind() == kind))
                .then(|| summary(items.len(), kind.type_name()))
        }
        _ => None,
    }
}

fn summary(len: usize, type_name: &str) -> String {
    format!("[*{len} {type_name}*]")
}

fn ensure_arguments(required: usize, provided: usize) -> Result<(), FormatError> {
    if provided < required {
        return Err(FormatError::MissingArgument {
            index: required - 1,
            provided,
        });
    }
    Ok(())
}

fn argument(args: &[Value], index: usize) -> Result<&Value, FormatError> {
    args.get(index)
        .ok_or(FormatError::MissingArgument {
            index,
            provided: args.len(),
        })
}
