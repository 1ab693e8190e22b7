//! Date-time and enumeration format specifiers.

use std::fmt::Write as _;

use chrono::{
    format::{Item, StrftimeItems},
    DateTime, FixedOffset, Timelike, Utc,
};

use super::value::EnumValue;

/// Ticks per second in the round-trip fraction.
const ROUND_TRIP_FRACTION_DIGITS: usize = 7;

/// Renders a date-time. Returns `None` for unknown specifiers.
///
/// | Spec | Output |
/// |------|--------|
/// | `O` `o` | `2024-03-05T14:07:09.1234567+02:00` |
/// | `s` | `2024-03-05T14:07:09` |
/// | `u` | `2024-03-05 12:07:09Z` (UTC) |
/// | `R` `r` | `Tue, 05 Mar 2024 12:07:09 GMT` (UTC) |
/// | contains `%` | `strftime` pattern |
pub(crate) fn format_date_time(value: &DateTime<FixedOffset>, spec: &str) -> Option<String> {
    match spec {
        "O" | "o" => Some(round_trip(value)),
        "s" => Some(value.format("%Y-%m-%dT%H:%M:%S").to_string()),
        "u" => Some(
            value
                .with_timezone(&Utc)
                .format("%Y-%m-%d %H:%M:%SZ")
                .to_string(),
        ),
        "R" | "r" => Some(
            value
                .with_timezone(&Utc)
                .format("%a, %d %b %Y %H:%M:%S GMT")
                .to_string(),
        ),
        pattern if pattern.contains('%') => strftime(value, pattern),
        _ => None,
    }
}

/// Renders a date-time without a specifier.
pub(crate) fn date_time_default(value: &DateTime<FixedOffset>) -> String {
    value.to_rfc3339()
}

fn round_trip(value: &DateTime<FixedOffset>) -> String {
    let ticks = (value.nanosecond() % 1_000_000_000) / 100;
    format!(
        "{}.{ticks:0width$}{}",
        value.format("%Y-%m-%dT%H:%M:%S"),
        value.format("%:z"),
        width = ROUND_TRIP_FRACTION_DIGITS
    )
}

fn strftime(value: &DateTime<FixedOffset>, pattern: &str) -> Option<String> {
    let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return None;
    }
    let mut out = String::new();
    write!(out, "{}", value.format_with_items(items.iter())).ok()?;
    Some(out)
}

/// Renders an enumeration. Returns `None` for unknown specifiers.
///
/// `G` and `F` give the variant name, `D` the discriminant, `X` the
/// discriminant in hex (8 digits, or 16 when it does not fit in 32 bits).
pub(crate) fn format_enum(value: &EnumValue, spec: &str) -> Option<String> {
    let hex_width = if i32::try_from(value.value).is_ok() { 8 } else { 16 };
    match spec {
        "G" | "g" | "F" | "f" => Some(value.name.to_owned()),
        "D" | "d" => Some(value.value.to_string()),
        "X" => Some(format!("{:0width$X}", hex_bits(value.value, hex_width), width = hex_width)),
        "x" => Some(format!("{:0width$x}", hex_bits(value.value, hex_width), width = hex_width)),
        _ => None,
    }
}

fn hex_bits(value: i64, width: usize) -> u64 {
    if width == 8 {
        u64::from(value as i32 as u32)
    } else {
        value as u64
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn sample() -> DateTime<FixedOffset> {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        offset
            .with_ymd_and_hms(2024, 3, 5, 14, 7, 9)
            .unwrap()
            .with_nanosecond(123_456_789)
            .unwrap()
    }

    #[test]
    fn round_trip_keeps_seven_fraction_digits_and_offset() {
        assert_eq!(
            format_date_time(&sample(), "O").unwrap(),
            "2024-03-05T14:07:09.1234567+02:00"
        );
    }

    #[test]
    fn sortable_and_universal_forms() {
        assert_eq!(format_date_time(&sample(), "s").unwrap(), "2024-03-05T14:07:09");
        assert_eq!(format_date_time(&sample(), "u").unwrap(), "2024-03-05 12:07:09Z");
        assert_eq!(
            format_date_time(&sample(), "R").unwrap(),
            "Tue, 05 Mar 2024 12:07:09 GMT"
        );
    }

    #[test]
    fn strftime_patterns_are_accepted() {
        assert_eq!(format_date_time(&sample(), "%Y/%m/%d").unwrap(), "2024/03/05");
        assert!(format_date_time(&sample(), "%Q").is_none());
    }

    #[test]
    fn unknown_date_time_spec_is_none() {
        assert!(format_date_time(&sample(), "yyyy").is_none());
    }

    #[test]
    fn enum_specs() {
        let value = EnumValue {
            type_name: "Level",
            name: "Warning",
            value: 3,
        };
        assert_eq!(format_enum(&value, "G").unwrap(), "Warning");
        assert_eq!(format_enum(&value, "D").unwrap(), "3");
        assert_eq!(format_enum(&value, "X").unwrap(), "00000003");
        assert!(format_enum(&value, "N").is_none());

        let negative = EnumValue {
            type_name: "Level",
            name: "Below",
            value: -1,
        };
        assert_eq!(format_enum(&negative, "X").unwrap(), "FFFFFFFF");
    }
}
