//! Standard numeric format specifiers.
//!
//! A specifier is one letter optionally followed by a precision of up to two
//! digits (`"F2"`, `"X8"`, `"G17"`).
//!
//! | Spec | Integers | Floats | Default precision |
//! |------|----------|--------|-------------------|
//! | `D` | zero-padded decimal | - | minimum digits |
//! | `X` `x` | two's complement hex | - | minimum digits |
//! | `B` | two's complement binary | - | minimum digits |
//! | `F` | fixed point | fixed point | 2 decimals |
//! | `N` | grouped fixed point | grouped fixed point | 2 decimals |
//! | `E` `e` | exponential | exponential | 6 decimals |
//! | `G` `g` | general | general | shortest |
//! | `P` | percent | percent | 2 decimals |
//! | `R` | - | shortest round trip | - |

use serde::{Deserialize, Serialize};

/// Decimal exponent at which shortest `f64` output switches to exponent form.
const DOUBLE_GENERAL_DIGITS: usize = 15;
/// Decimal exponent at which shortest `f32` output switches to exponent form.
const SINGLE_GENERAL_DIGITS: usize = 7;
/// Smallest exponent rendered without exponent notation by `G`.
const GENERAL_MIN_EXPONENT: i32 = -5;

/// Symbols used when rendering numbers.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Culture {
    pub decimal_separator: String,
    pub group_separator: String,
    pub negative_sign: String,
    pub percent_symbol: String,
    pub nan_symbol: String,
    pub positive_infinity_symbol: String,
    pub negative_infinity_symbol: String,
}

impl Culture {
    /// Culture-independent symbols.
    pub fn invariant() -> Self {
        Self {
            decimal_separator: ".".to_owned(),
            group_separator: ",".to_owned(),
            negative_sign: "-".to_owned(),
            percent_symbol: "%".to_owned(),
            nan_symbol: "NaN".to_owned(),
            positive_infinity_symbol: "Infinity".to_owned(),
            negative_infinity_symbol: "-Infinity".to_owned(),
        }
    }
}

impl Default for Culture {
    fn default() -> Self {
        Self::invariant()
    }
}

/// A floating point value of either width.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Float {
    Single(f32),
    Double(f64),
}

impl Float {
    fn is_nan(self) -> bool {
        match self {
            Float::Single(v) => v.is_nan(),
            Float::Double(v) => v.is_nan(),
        }
    }

    fn is_infinite(self) -> bool {
        match self {
            Float::Single(v) => v.is_infinite(),
            Float::Double(v) => v.is_infinite(),
        }
    }

    fn is_sign_negative(self) -> bool {
        match self {
            Float::Single(v) => v.is_sign_negative(),
            Float::Double(v) => v.is_sign_negative(),
        }
    }

    fn abs(self) -> Self {
        match self {
            Float::Single(v) => Float::Single(v.abs()),
            Float::Double(v) => Float::Double(v.abs()),
        }
    }

    fn percent(self) -> Self {
        match self {
            Float::Single(v) => Float::Single(v * 100.0),
            Float::Double(v) => Float::Double(v * 100.0),
        }
    }

    /// Exponent notation, shortest round trip when `decimals` is `None`.
    fn exponential(self, decimals: Option<usize>) -> String {
        match (self, decimals) {
            (Float::Single(v), None) => format!("{v:e}"),
            (Float::Double(v), None) => format!("{v:e}"),
            (Float::Single(v), Some(d)) => format!("{v:.d$e}"),
            (Float::Double(v), Some(d)) => format!("{v:.d$e}"),
        }
    }

    fn fixed(self, decimals: usize) -> String {
        match self {
            Float::Single(v) => format!("{v:.decimals$}"),
            Float::Double(v) => format!("{v:.decimals$}"),
        }
    }

    fn general_digits(self) -> usize {
        match self {
            Float::Single(_) => SINGLE_GENERAL_DIGITS,
            Float::Double(_) => DOUBLE_GENERAL_DIGITS,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct Standard {
    kind: char,
    precision: Option<usize>,
}

fn parse_standard(spec: &str) -> Option<Standard> {
    let mut chars = spec.chars();
    let kind = chars.next().filter(char::is_ascii_alphabetic)?;
    let digits = chars.as_str();
    if digits.is_empty() {
        return Some(Standard {
            kind,
            precision: None,
        });
    }
    if digits.len() > 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(Standard {
        kind,
        precision: digits.parse().ok(),
    })
}

// =============================================================================
// Integers
// =============================================================================

/// Renders an integer without a specifier.
pub(crate) fn integer_default(value: i128, culture: &Culture) -> String {
    signed(value < 0, value.unsigned_abs().to_string(), culture)
}

/// Renders an integer of `bits` width. Returns `None` for unknown specifiers.
pub(crate) fn format_integer(
    value: i128,
    bits: u32,
    spec: &str,
    culture: &Culture,
) -> Option<String> {
    let Standard { kind, precision } = parse_standard(spec)?;
    let negative = value < 0;
    let digits = value.unsigned_abs().to_string();

    let text = match kind {
        'D' | 'd' => signed(negative, zero_pad(&digits, precision.unwrap_or(0)), culture),
        'X' => zero_pad(
            &format!("{:X}", twos_complement(value, bits)),
            precision.unwrap_or(0),
        ),
        'x' => zero_pad(
            &format!("{:x}", twos_complement(value, bits)),
            precision.unwrap_or(0),
        ),
        'B' | 'b' => zero_pad(
            &format!("{:b}", twos_complement(value, bits)),
            precision.unwrap_or(0),
        ),
        'F' | 'f' => signed(
            negative,
            with_decimals(&digits, "", precision.unwrap_or(2), culture),
            culture,
        ),
        'N' | 'n' => signed(
            negative,
            with_decimals(&group(&digits, culture), "", precision.unwrap_or(2), culture),
            culture,
        ),
        'E' | 'e' => signed(
            negative,
            integer_exponential(&digits, precision.unwrap_or(6), kind == 'E', culture),
            culture,
        ),
        'G' | 'g' => match precision {
            Some(p) if p > 0 && p < digits.len() => signed(
                negative,
                integer_general(&digits, p, kind == 'G', culture),
                culture,
            ),
            _ => signed(negative, digits, culture),
        },
        'P' | 'p' => {
            let scaled = if value == 0 {
                digits
            } else {
                format!("{digits}00")
            };
            let body = with_decimals(&group(&scaled, culture), "", precision.unwrap_or(2), culture);
            format!(
                "{} {}",
                signed(negative, body, culture),
                culture.percent_symbol
            )
        }
        _ => return None,
    };
    Some(text)
}

fn twos_complement(value: i128, bits: u32) -> u128 {
    let mask = if bits >= 128 {
        u128::MAX
    } else {
        (1_u128 << bits) - 1
    };
    (value as u128) & mask
}

fn integer_exponential(digits: &str, decimals: usize, upper: bool, culture: &Culture) -> String {
    let (rounded, carry) = round_significant(digits, decimals + 1);
    let exponent = (digits.len() - 1 + carry) as i32;
    let (first, rest) = rounded.split_at(1);
    let mut out = first.to_owned();
    if decimals > 0 {
        out.push_str(&culture.decimal_separator);
        out.push_str(rest);
        out.extend(std::iter::repeat('0').take(decimals.saturating_sub(rest.len())));
    }
    out.push_str(&exponent_suffix(exponent, 3, upper));
    out
}

fn integer_general(digits: &str, precision: usize, upper: bool, culture: &Culture) -> String {
    let (rounded, carry) = round_significant(digits, precision);
    let exponent = (digits.len() - 1 + carry) as i32;
    scientific(&rounded, exponent, upper, culture)
}

/// Rounds a digit string half away from zero to `keep` significant digits.
///
/// Returns the kept digits and 1 if rounding carried into a new leading digit.
fn round_significant(digits: &str, keep: usize) -> (String, usize) {
    if digits.len() <= keep {
        return (digits.to_owned(), 0);
    }
    let mut kept: Vec<u8> = digits.as_bytes()[..keep].to_vec();
    if digits.as_bytes()[keep] < b'5' {
        return (String::from_utf8_lossy(&kept).into_owned(), 0);
    }
    for digit in kept.iter_mut().rev() {
        if *digit == b'9' {
            *digit = b'0';
        } else {
            *digit += 1;
            return (String::from_utf8_lossy(&kept).into_owned(), 0);
        }
    }
    kept.insert(0, b'1');
    kept.truncate(keep);
    (String::from_utf8_lossy(&kept).into_owned(), 1)
}

// =============================================================================
// Floats
// =============================================================================

/// Shortest round-trip rendering, in exponent form for very large or small
/// magnitudes.
pub(crate) fn float_default(value: Float, culture: &Culture) -> String {
    if let Some(special) = non_finite(value, culture) {
        return special;
    }
    let body = general(&value.abs().exponential(None), value.general_digits(), true, culture);
    signed(value.is_sign_negative(), body, culture)
}

/// Renders a float. Returns `None` for unknown specifiers.
pub(crate) fn format_float(value: Float, spec: &str, culture: &Culture) -> Option<String> {
    let Standard { kind, precision } = parse_standard(spec)?;
    if !matches!(kind.to_ascii_uppercase(), 'F' | 'N' | 'E' | 'G' | 'P' | 'R') {
        return None;
    }
    if let Some(special) = non_finite(value, culture) {
        return Some(special);
    }

    let negative = value.is_sign_negative();
    let abs = value.abs();
    let text = match kind {
        'F' | 'f' => signed(
            negative,
            localize(&abs.fixed(precision.unwrap_or(2)), culture),
            culture,
        ),
        'N' | 'n' => signed(
            negative,
            grouped(&abs.fixed(precision.unwrap_or(2)), culture),
            culture,
        ),
        'E' | 'e' => signed(
            negative,
            float_exponential(&abs.exponential(Some(precision.unwrap_or(6))), kind == 'E', culture),
            culture,
        ),
        'G' | 'g' => {
            let body = match precision {
                Some(p) if p > 0 => general(&abs.exponential(Some(p - 1)), p, kind == 'G', culture),
                _ => general(&abs.exponential(None), value.general_digits(), kind == 'G', culture),
            };
            signed(negative, body, culture)
        }
        'R' | 'r' => signed(
            negative,
            general(&abs.exponential(None), value.general_digits(), true, culture),
            culture,
        ),
        _ => {
            let body = grouped(&abs.percent().fixed(precision.unwrap_or(2)), culture);
            format!(
                "{} {}",
                signed(negative, body, culture),
                culture.percent_symbol
            )
        }
    };
    Some(text)
}

fn non_finite(value: Float, culture: &Culture) -> Option<String> {
    if value.is_nan() {
        Some(culture.nan_symbol.clone())
    } else if value.is_infinite() {
        Some(if value.is_sign_negative() {
            culture.negative_infinity_symbol.clone()
        } else {
            culture.positive_infinity_symbol.clone()
        })
    } else {
        None
    }
}

/// Splits Rust's `{:e}` output into significant digits and decimal exponent.
fn split_exponential(text: &str) -> (String, i32) {
    let (mantissa, exponent) = text.split_once('e').unwrap_or((text, "0"));
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    (digits, exponent.parse().unwrap_or(0))
}

/// `G` layout: fixed notation unless the exponent falls outside
/// `[-5, precision)`. Trailing zeros are dropped.
fn general(exponential: &str, precision: usize, upper: bool, culture: &Culture) -> String {
    let (digits, exponent) = split_exponential(exponential);
    let trimmed = digits.trim_end_matches('0');
    let digits = if trimmed.is_empty() { "0" } else { trimmed };

    let precision = i32::try_from(precision).unwrap_or(i32::MAX);
    if exponent < GENERAL_MIN_EXPONENT || exponent >= precision {
        return scientific(digits, exponent, upper, culture);
    }

    match usize::try_from(exponent) {
        Ok(whole) if digits.len() <= whole + 1 => {
            let mut out = digits.to_owned();
            out.extend(std::iter::repeat('0').take(whole + 1 - digits.len()));
            out
        }
        Ok(whole) => format!(
            "{}{}{}",
            &digits[..=whole],
            culture.decimal_separator,
            &digits[whole + 1..]
        ),
        Err(_) => {
            let zeros = exponent.unsigned_abs() as usize - 1;
            format!(
                "0{}{}{}",
                culture.decimal_separator,
                "0".repeat(zeros),
                digits
            )
        }
    }
}

/// `d.ddd` followed by a signed exponent of at least two digits.
fn scientific(digits: &str, exponent: i32, upper: bool, culture: &Culture) -> String {
    let trimmed = digits.trim_end_matches('0');
    let digits = if trimmed.is_empty() { "0" } else { trimmed };
    let (first, rest) = digits.split_at(1);
    let mut out = first.to_owned();
    if !rest.is_empty() {
        out.push_str(&culture.decimal_separator);
        out.push_str(rest);
    }
    out.push_str(&exponent_suffix(exponent, 2, upper));
    out
}

fn float_exponential(exponential: &str, upper: bool, culture: &Culture) -> String {
    let (mantissa, exponent) = exponential
        .split_once('e')
        .unwrap_or((exponential, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    format!(
        "{}{}",
        localize(mantissa, culture),
        exponent_suffix(exponent, 3, upper)
    )
}

// =============================================================================
// Shared pieces
// =============================================================================

fn signed(negative: bool, body: String, culture: &Culture) -> String {
    if negative {
        format!("{}{body}", culture.negative_sign)
    } else {
        body
    }
}

fn zero_pad(digits: &str, width: usize) -> String {
    format!("{digits:0>width$}")
}

fn exponent_suffix(exponent: i32, min_digits: usize, upper: bool) -> String {
    let marker = if upper { 'E' } else { 'e' };
    let sign = if exponent < 0 { '-' } else { '+' };
    format!(
        "{marker}{sign}{:0>min_digits$}",
        exponent.unsigned_abs()
    )
}

/// Replaces the `.` of a Rust-formatted number with the culture's separator.
fn localize(text: &str, culture: &Culture) -> String {
    text.replacen('.', &culture.decimal_separator, 1)
}

/// Groups the integer part of a Rust-formatted fixed-point number.
fn grouped(text: &str, culture: &Culture) -> String {
    match text.split_once('.') {
        Some((whole, fraction)) => {
            format!("{}{}{fraction}", group(whole, culture), culture.decimal_separator)
        }
        None => group(text, culture),
    }
}

fn group(digits: &str, culture: &Culture) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push_str(&culture.group_separator);
        }
        out.push(ch);
    }
    out
}

fn with_decimals(whole: &str, fraction: &str, decimals: usize, culture: &Culture) -> String {
    if decimals == 0 {
        return whole.to_owned();
    }
    format!(
        "{whole}{}{fraction:0<decimals$}",
        culture.decimal_separator
    )
}
