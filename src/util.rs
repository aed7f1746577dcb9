// Parsing and small statistics helpers.
//
// Sheet exports are messy: numbers arrive with thousands separators, flags
// arrive as "1", "1.0", "Yes" or "TRUE", and empty cells mean "not observed".
// Everything here maps that mess to `Option`s so the engines never see NaN.
use num_format::{Locale, ToFormattedString};

/// Parse a numeric cell. Rejects text, strips `,` separators, and returns
/// `None` for empty cells and non-finite values.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let s = s.replace(',', "");
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Integer cells are sometimes exported as `12.0`; accept those when the
/// fractional part is zero.
pub fn parse_i64_safe(s: Option<&str>) -> Option<i64> {
    let v = parse_f64_safe(s)?;
    if v.fract() != 0.0 || v.abs() > i64::MAX as f64 {
        return None;
    }
    Some(v as i64)
}

/// Parse a yes/no cell. Words are matched case-insensitively; anything else
/// goes through the numeric parser, where any non-zero value means "yes".
/// Empty cells stay `None` (not observed), never `false`.
pub fn parse_flag_safe(s: Option<&str>) -> Option<bool> {
    let s = s?.trim();
    match s.to_ascii_lowercase().as_str() {
        "" => None,
        "yes" | "y" | "true" => Some(true),
        "no" | "n" | "false" => Some(false),
        _ => parse_f64_safe(Some(s)).map(|v| v != 0.0),
    }
}

/// Trimmed text of a label cell, or `fallback` when the cell is missing or
/// blank.
///
/// Used for the location columns so every school lands in some group; the
/// loader passes `"Unknown"` for those.
pub fn non_empty_or(s: Option<String>, fallback: &str) -> String {
    match s {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

/// Mean over the present, finite values. `None` when nothing is left.
pub fn mean<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    // Single pass: running sum and count of the values that survive.
    let (sum, n) = values
        .into_iter()
        .flatten()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        None
    } else {
        Some(sum / n as f64)
    }
}

/// `num / den`, or `None` when the denominator is zero or the result is not
/// finite.
pub fn safe_ratio(num: f64, den: f64) -> Option<f64> {
    if den == 0.0 {
        return None;
    }
    Some(num / den).filter(|v| v.is_finite())
}

/// Share of `hits` in `total` as a percentage; 0 for an empty total.
pub fn percent(hits: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    hits as f64 / total as f64 * 100.0
}

/// Round half away from zero to `decimals` places, the way headline figures
/// are displayed (`round_to(33.333, 1) == 33.3`).
///
/// Only for presentation values; the engines keep full precision.
pub fn round_to(v: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (v * factor).round() / factor
}

/// Format a number with `,` thousands separators and a fixed number of
/// decimals, e.g. `1234567.891` → `"1,234,567.89"`.
///
/// - Non-finite values render as `-`.
/// - The integer part goes through `num-format`; the fraction is appended
///   as produced by `format!`.
/// - A minus sign is dropped when rounding leaves only zeros (`-0.001` →
///   `"0.00"`).
pub fn format_number(n: f64, decimals: usize) -> String {
    if !n.is_finite() {
        return "-".to_string();
    }
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        res.push('.');
        res.push_str(frac);
    }
    if neg && res.chars().any(|c| c.is_ascii_digit() && c != '0') {
        format!("-{}", res)
    } else {
        res
    }
}

/// Optional values render as `-` in tables.
pub fn format_opt(n: Option<f64>, decimals: usize) -> String {
    n.map(|v| format_number(v, decimals))
        .unwrap_or_else(|| "-".to_string())
}

/// Thousands-separated integer for counts in console output.
pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}
