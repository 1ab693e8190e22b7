//! The dynamic value model log arguments are captured into.
//!
//! Arguments are converted into [`Value`]s when a log call is made, so that
//! the formatter can inspect their shape (scalar, sequence, mapping, object)
//! without runtime reflection.
//!
//! - [`ToValue`]: conversion from Rust values, implemented for std types and
//!   generated by `#[derive(ToValue)]`.
//! - [`LogFields`]: the field list of a struct, walked in serialize mode.
//! - [`LogFormattable`]: values that render themselves.

use std::{
    borrow::Cow,
    collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque},
    fmt,
    marker::PhantomData,
    sync::Arc,
};

use bytes::Bytes;
use chrono::{DateTime, FixedOffset, TimeZone};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::numeric::Culture;

// =============================================================================
// Value
// =============================================================================

/// A captured log argument.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Char(char),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Str(String),
    Bytes(Bytes),
    DateTime(DateTime<FixedOffset>),
    Enum(EnumValue),
    Seq(Vec<Value>),
    /// Key/value pairs in iteration order.
    Map(Vec<(Value, Value)>),
    Object(ObjectValue),
    Custom(Arc<dyn LogFormattable>),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Char(_) => ValueKind::Char,
            Value::I8(_) => ValueKind::I8,
            Value::I16(_) => ValueKind::I16,
            Value::I32(_) => ValueKind::I32,
            Value::I64(_) => ValueKind::I64,
            Value::U8(_) => ValueKind::U8,
            Value::U16(_) => ValueKind::U16,
            Value::U32(_) => ValueKind::U32,
            Value::U64(_) => ValueKind::U64,
            Value::F32(_) => ValueKind::F32,
            Value::F64(_) => ValueKind::F64,
            Value::Str(_) => ValueKind::Str,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::DateTime(_) => ValueKind::DateTime,
            Value::Enum(_) => ValueKind::Enum,
            Value::Seq(_) => ValueKind::Seq,
            Value::Map(_) => ValueKind::Map,
            Value::Object(_) => ValueKind::Object,
            Value::Custom(_) => ValueKind::Custom,
        }
    }

    /// Type name used in summaries and error messages.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Enum(value) => value.type_name,
            Value::Object(object) => object.type_name,
            Value::Custom(custom) => custom.type_name(),
            other => other.kind().type_name(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn bytes<B: Into<Bytes>>(bytes: B) -> Self {
        Value::Bytes(bytes.into())
    }

    /// Snapshots `value`'s fields as an object.
    pub fn object<T: LogFields + ?Sized>(value: &T) -> Self {
        Value::Object(ObjectValue::capture(value))
    }

    pub fn custom<T: LogFormattable + 'static>(value: T) -> Self {
        Value::Custom(Arc::new(value))
    }

    /// Converts a sequence of values.
    pub fn seq<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Value::Seq(items.into_iter().map(Into::into).collect())
    }

    /// Converts key/value pairs, keeping their order.
    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Value>,
        V: Into<Value>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// The shape of a [`Value`], used to key per-type format overrides.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueKind {
    Null,
    Bool,
    Char,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Str,
    Bytes,
    DateTime,
    Enum,
    Seq,
    Map,
    Object,
    Custom,
}

impl ValueKind {
    pub fn type_name(self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Char => "char",
            ValueKind::I8 => "i8",
            ValueKind::I16 => "i16",
            ValueKind::I32 => "i32",
            ValueKind::I64 => "i64",
            ValueKind::U8 => "u8",
            ValueKind::U16 => "u16",
            ValueKind::U32 => "u32",
            ValueKind::U64 => "u64",
            ValueKind::F32 => "f32",
            ValueKind::F64 => "f64",
            ValueKind::Str => "string",
            ValueKind::Bytes => "bytes",
            ValueKind::DateTime => "datetime",
            ValueKind::Enum => "enum",
            ValueKind::Seq => "sequence",
            ValueKind::Map => "map",
            ValueKind::Object => "object",
            ValueKind::Custom => "custom",
        }
    }

    /// Scalars a sequence may be summarized over.
    pub fn is_primitive(self) -> bool {
        matches!(
            self,
            ValueKind::Bool
                | ValueKind::Char
                | ValueKind::I8
                | ValueKind::I16
                | ValueKind::I32
                | ValueKind::I64
                | ValueKind::U8
                | ValueKind::U16
                | ValueKind::U32
                | ValueKind::U64
                | ValueKind::F32
                | ValueKind::F64
        )
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// A field-less enum variant.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EnumValue {
    pub type_name: &'static str,
    pub name: &'static str,
    pub value: i64,
}

/// A snapshot of a struct's readable fields.
#[derive(Clone, Debug)]
pub struct ObjectValue {
    pub type_name: &'static str,
    /// Text used when the object is rendered without serialize mode.
    pub display: Option<String>,
    pub fields: Vec<(&'static str, Value)>,
}

impl ObjectValue {
    pub fn capture<T: LogFields + ?Sized>(value: &T) -> Self {
        Self {
            type_name: value.type_name(),
            display: value.display_text(),
            fields: value.log_fields(),
        }
    }
}

// =============================================================================
// Capabilities
// =============================================================================

/// A type whose fields can be listed for serialize-mode rendering.
///
/// Usually generated by `#[derive(ToValue)]`.
pub trait LogFields {
    fn type_name(&self) -> &'static str;

    /// Text for plain (non-serialized) rendering. Defaults to the type name.
    fn display_text(&self) -> Option<String> {
        None
    }

    /// Field names and values, in declaration order.
    fn log_fields(&self) -> Vec<(&'static str, Value)>;
}

/// A value that renders itself, with or without a format specifier.
///
/// Specifiers the formatter does not know are passed through here instead of
/// failing.
pub trait LogFormattable: fmt::Debug + Send + Sync {
    fn type_name(&self) -> &str;

    fn format_log(&self, spec: Option<&str>, culture: &Culture) -> String;
}

/// Conversion of a log argument into a [`Value`].
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot be used as a log argument",
    label = "this type does not implement `ToValue`",
    note = "use `#[derive(ToValue)]` on the type definition",
    note = "or wrap it with `Value::custom` if it formats itself"
)]
pub trait ToValue {
    fn to_value(&self) -> Value;
}

// =============================================================================
// ToValue implementations for standard library types
// =============================================================================

macro_rules! impl_to_value_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl ToValue for $ty {
                fn to_value(&self) -> Value {
                    Value::$variant(*self)
                }
            }

            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

impl_to_value_scalar!(
    bool => Bool,
    char => Char,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
);

impl ToValue for isize {
    fn to_value(&self) -> Value {
        Value::I64(*self as i64)
    }
}

impl ToValue for usize {
    fn to_value(&self) -> Value {
        Value::U64(*self as u64)
    }
}

impl ToValue for () {
    fn to_value(&self) -> Value {
        Value::Null
    }
}

impl<T: ?Sized> ToValue for PhantomData<T> {
    fn to_value(&self) -> Value {
        Value::Null
    }
}

impl ToValue for str {
    fn to_value(&self) -> Value {
        Value::Str(self.to_owned())
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::Str(self.clone())
    }
}

impl ToValue for Cow<'_, str> {
    fn to_value(&self) -> Value {
        Value::Str(self.as_ref().to_owned())
    }
}

impl ToValue for Bytes {
    fn to_value(&self) -> Value {
        Value::Bytes(self.clone())
    }
}

impl ToValue for Uuid {
    fn to_value(&self) -> Value {
        Value::Str(self.to_string())
    }
}

impl<Tz: TimeZone> ToValue for DateTime<Tz> {
    fn to_value(&self) -> Value {
        Value::DateTime(self.fixed_offset())
    }
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl<T> ToValue for &T
where
    T: ToValue + ?Sized,
{
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

impl<T> ToValue for Box<T>
where
    T: ToValue + ?Sized,
{
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

impl<T> ToValue for Arc<T>
where
    T: ToValue + ?Sized,
{
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

impl<T> ToValue for Option<T>
where
    T: ToValue,
{
    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, ToValue::to_value)
    }
}

impl<T> ToValue for [T]
where
    T: ToValue,
{
    fn to_value(&self) -> Value {
        Value::Seq(self.iter().map(ToValue::to_value).collect())
    }
}

impl<T, const N: usize> ToValue for [T; N]
where
    T: ToValue,
{
    fn to_value(&self) -> Value {
        self.as_slice().to_value()
    }
}

impl<T> ToValue for Vec<T>
where
    T: ToValue,
{
    fn to_value(&self) -> Value {
        self.as_slice().to_value()
    }
}

impl<T> ToValue for VecDeque<T>
where
    T: ToValue,
{
    fn to_value(&self) -> Value {
        Value::Seq(self.iter().map(ToValue::to_value).collect())
    }
}

impl<T, S> ToValue for HashSet<T, S>
where
    T: ToValue,
{
    fn to_value(&self) -> Value {
        Value::Seq(self.iter().map(ToValue::to_value).collect())
    }
}

impl<T> ToValue for BTreeSet<T>
where
    T: ToValue,
{
    fn to_value(&self) -> Value {
        Value::Seq(self.iter().map(ToValue::to_value).collect())
    }
}

impl<K, V, S> ToValue for HashMap<K, V, S>
where
    K: ToValue,
    V: ToValue,
{
    fn to_value(&self) -> Value {
        Value::Map(
            self.iter()
                .map(|(k, v)| (k.to_value(), v.to_value()))
                .collect(),
        )
    }
}

impl<K, V> ToValue for BTreeMap<K, V>
where
    K: ToValue,
    V: ToValue,
{
    fn to_value(&self) -> Value {
        Value::Map(
            self.iter()
                .map(|(k, v)| (k.to_value(), v.to_value()))
                .collect(),
        )
    }
}

// =============================================================================
// Conversions into Value
// =============================================================================

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<Bytes> for Value {
    fn from(value: Bytes) -> Self {
        Value::Bytes(value)
    }
}

impl From<EnumValue> for Value {
    fn from(value: EnumValue) -> Self {
        Value::Enum(value)
    }
}

impl From<ObjectValue> for Value {
    fn from(value: ObjectValue) -> Self {
        Value::Object(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Seq(value)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Captures log arguments into an array of [`Value`]s.
///
/// ```ignore
/// logger.information(Some("User {Name} has {Count} items"), &args!["alice", 3])?;
/// ```
#[macro_export]
macro_rules! args {
    () => {{
        let empty: [$crate::Value; 0] = [];
        empty
    }};
    ($($arg:expr),+ $(,)?) => {
        [$($crate::ToValue::to_value(&$arg)),+]
    };
}
