//! End-to-end tests for redaction-aware value formatting.
//!
//! These tests exercise the formatter through templates, the way a logger
//! uses it, with a frozen registry.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use logbook::{
    args, FieldKind, FormatError, FormatOverrides, MessageTemplate, Rendering,
    SensitiveFieldRegistry, ToValue, Value, ValueFormatter, ValueKind,
};

fn formatter_with(names: &[(FieldKind, &str)]) -> ValueFormatter {
    let mut registry = SensitiveFieldRegistry::new();
    for (kind, name) in names {
        registry.add(*kind, name).unwrap();
    }
    registry.make_read_only();
    ValueFormatter::new(Arc::new(registry))
}

fn render(formatter: &ValueFormatter, template: &str, arguments: &[Value]) -> String {
    let template = MessageTemplate::parse(template).unwrap();
    formatter.format_template(&template, arguments).unwrap()
}

#[test]
fn test_login_password_is_redacted_once_registered() {
    let template = "Login: {Login}. Password: {Password}.";
    let arguments = args!["alice", "secret"];

    let open = formatter_with(&[]);
    assert_eq!(
        render(&open, template, &arguments),
        "Login: alice. Password: secret."
    );

    let guarded = formatter_with(&[(FieldKind::Segment, "Password")]);
    assert_eq!(
        render(&guarded, template, &arguments),
        "Login: alice. Password: [Redacted]."
    );
}

#[test]
fn test_redacted_segment_never_leaks_under_any_format() {
    let formatter = formatter_with(&[(FieldKind::Segment, "Password")]);
    let rendered = render(
        &formatter,
        "{Password} {Password,12} {Password:X} {@Password}",
        &args!["hunter2"],
    );
    assert_eq!(rendered, "[Redacted]   [Redacted] [Redacted] [Redacted]");
    assert!(!rendered.contains("hunter2"));
}

#[test]
fn test_single_precision_uses_nine_significant_digits() {
    let formatter = formatter_with(&[]);
    assert_eq!(render(&formatter, "{Ratio}", &args![1.1_f32]), "1.10000002");
    assert_eq!(render(&formatter, "{Ratio:F2}", &args![1.1_f32]), "1.10");
}

#[test]
fn test_overrides_are_configurable_per_kind() {
    let overrides = FormatOverrides::default().with(ValueKind::I32, "D4");
    let formatter = formatter_with(&[]).with_overrides(overrides);
    assert_eq!(render(&formatter, "{Code}", &args![42]), "0042");
    assert_eq!(render(&formatter, "{Code:X}", &args![42]), "2A");
}

#[test]
fn test_mapping_renders_as_pairs_with_null_sentinel() {
    let formatter = formatter_with(&[]);
    let mut map = BTreeMap::new();
    map.insert("a", Some(1));
    map.insert("b", None);
    assert_eq!(
        render(&formatter, "{Map}", &args![map]),
        "[[a, 1], [b, (null)]]"
    );
}

#[test]
fn test_dictionary_keys_redact_values_not_keys() {
    let formatter = formatter_with(&[(FieldKind::DictionaryKey, "token")]);
    let mut headers = HashMap::new();
    headers.insert("token".to_owned(), "abc123".to_owned());
    assert_eq!(
        render(&formatter, "{Headers}", &args![headers]),
        "[[token, [Redacted]]]"
    );
}

#[test]
fn test_empty_collections_and_null() {
    let formatter = formatter_with(&[]);
    let empty: Vec<i32> = Vec::new();
    let missing: Option<&str> = None;
    assert_eq!(
        render(&formatter, "{List} {Map} {Missing}", &args![empty, BTreeMap::<String, i32>::new(), missing]),
        "[] [] (null)"
    );
}

#[test]
fn test_summary_kind_collapses_primitive_collections() {
    let formatter = formatter_with(&[(FieldKind::Summary, "Samples")]);
    let samples = vec![1_i32; 500];
    assert_eq!(render(&formatter, "{Samples}", &args![samples]), "[*500 i32*]");

    let payload = Value::bytes(vec![0_u8; 16]);
    assert_eq!(render(&formatter, "{Samples}", &[payload]), "[*16 u8*]");

    let mixed = Value::seq(vec![Value::from(1), Value::from("two")]);
    assert_eq!(render(&formatter, "{Samples}", &[mixed]), "[1, two]");
}

#[test]
fn test_redacted_bytes_keep_only_their_length() {
    let formatter = formatter_with(&[(FieldKind::Segment, "Key")]);
    let key = Value::bytes(vec![7_u8; 32]);
    assert_eq!(render(&formatter, "{Key}", &[key]), "[*32 u8*]");
}

#[test]
fn test_unknown_spec_names_spec_and_type() {
    let formatter = formatter_with(&[]);
    let template = MessageTemplate::parse("{Flag:Q}").unwrap();
    let err = formatter
        .format_template(&template, &args![true])
        .unwrap_err();
    assert_eq!(
        err,
        FormatError::UnsupportedSpec {
            spec: "Q".into(),
            type_name: "bool".into()
        }
    );
}

#[test]
fn test_formatting_is_idempotent() {
    let formatter = formatter_with(&[(FieldKind::Segment, "Card")]);
    let template = MessageTemplate::parse("{Card} paid {Amount:N2} on {Items}").unwrap();
    let arguments = args!["4111-1111", 1234.5_f64, vec!["tea", "milk"]];
    let first = formatter.format_template(&template, &arguments).unwrap();
    let second = formatter.format_template(&template, &arguments).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, "[Redacted] paid 1,234.50 on [tea, milk]");
}

#[test]
fn test_direct_format_with_explicit_rendering() {
    let formatter = formatter_with(&[]);
    let value = 255_u8.to_value();
    assert_eq!(formatter.format(&value, Some("X"), Rendering::Plain).unwrap(), "FF");
    assert_eq!(
        formatter.format(&value, Some("X"), Rendering::Redact).unwrap(),
        "[Redacted]"
    );
}
