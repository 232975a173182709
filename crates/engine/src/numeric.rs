//! Numeric parsing and formatting for form values.
//!
//! Every form value is text. Parsing never fails: a value that does not start
//! with a number is *absent*, which callers read as `0` for arithmetic but as
//! "no input" when deciding whether a derived field should be shown at all.
//!
//! Both `.` and `,` are accepted as the decimal separator. Like the browser
//! form this engine replaces, only the leading numeric prefix is read, so
//! `"12abc"` is 12 and `"1.2.3"` is 1.2.

/// Decimal places used for every area-like field (hectares).
pub const AREA_DECIMALS: usize = 4;

/// Decimal places used for volumes, indices and yields.
pub const VOLUME_DECIMALS: usize = 2;

/// Largest value accepted in an area-like field.
pub const MAX_AREA: f64 = 999.9999;

/// Parse a form value as a number.
///
/// Returns `None` when the value is blank or has no numeric prefix.
///
/// # Examples
/// ```
/// use dbforestale_engine::numeric::parse_number;
///
/// assert_eq!(parse_number("12,5"), Some(12.5));
/// assert_eq!(parse_number(" 3.25 "), Some(3.25));
/// assert_eq!(parse_number("40 anni"), Some(40.0));
/// assert_eq!(parse_number(""), None);
/// assert_eq!(parse_number("n/a"), None);
/// ```
pub fn parse_number(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    let normalized = trimmed.replace(',', ".");
    let prefix = numeric_prefix(&normalized);
    if prefix.is_empty() {
        return None;
    }

    prefix.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Parse a form value, reading absent values as zero.
pub fn value_or_zero(value: &str) -> f64 {
    parse_number(value).unwrap_or(0.0)
}

/// Longest prefix of `s` that reads as a decimal number: optional sign,
/// digits with an optional fractional part, optional exponent.
fn numeric_prefix(s: &str) -> &str {
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        let frac_digits = frac_end - frac_start;
        if digits + frac_digits > 0 {
            end = frac_end;
            digits += frac_digits;
        }
    }

    if digits == 0 {
        return "";
    }

    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    &s[..end]
}

/// Format with a fixed number of decimals (`12.5` -> `"12.5000"` for 4).
pub fn format_fixed(value: f64, decimals: usize) -> String {
    // Avoid "-0.00"
    let value = if value == 0.0 { 0.0 } else { value };
    format!("{:.*}", decimals, value)
}

/// Format a derived value, or empty when it is not strictly positive.
pub fn format_positive(value: f64, decimals: usize) -> String {
    if value > 0.0 {
        format_fixed(value, decimals)
    } else {
        String::new()
    }
}

/// Format without trailing zeros (`50.0` -> `"50"`, `50.5` -> `"50.5"`).
pub fn format_plain(value: f64) -> String {
    let value = if value == 0.0 { 0.0 } else { value };
    format!("{}", value)
}
