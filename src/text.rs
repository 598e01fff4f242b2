//! Text normalization and numeric helpers shared by every matching operation.
//!
//! `normalize` is the single folding rule for column names, search terms and
//! comparison values: two strings compare equal under it iff they are equal
//! ignoring accents and case. Plural forms are not folded.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Strips accents and case: NFKD-decomposes, drops combining marks and any
/// remaining non-ASCII, then lower-cases. Idempotent.
pub fn normalize(text: &str) -> String {
    text.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| c.is_ascii())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(?:[.,]\d+)*").expect("number pattern is valid"));

/// Extracts the first numeric value from a formatted result string.
///
/// The separator convention is disambiguated by position: when both `,` and
/// `.` appear, the rightmost one is the decimal point (`1.234,56` is
/// Brazilian, `1,234.56` is international). A lone comma followed by exactly
/// three trailing digits is read as a thousands separator, otherwise as a
/// decimal point. Strings like `12,345` are therefore inherently ambiguous
/// and resolve to twelve thousand; kept for compatibility with historical
/// outputs.
pub fn extract_number(text: &str) -> Option<f64> {
    let raw = NUMBER_RE.find(text)?.as_str();
    let has_comma = raw.contains(',');
    let has_dot = raw.contains('.');

    let cleaned = if has_comma && has_dot {
        let last_comma = raw.rfind(',')?;
        let last_dot = raw.rfind('.')?;
        if last_comma > last_dot {
            raw.replace('.', "").replace(',', ".")
        } else {
            raw.replace(',', "")
        }
    } else if has_comma {
        let parts: Vec<&str> = raw.split(',').collect();
        if parts.len() > 1 && parts.last().is_some_and(|p| p.len() == 3) {
            raw.replace(',', "")
        } else {
            raw.replace(',', ".")
        }
    } else {
        raw.to_string()
    };

    cleaned.parse().ok()
}

/// Formats a value with comma thousands grouping and a fixed number of
/// decimals, matching the convention of the result strings.
pub fn format_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((int_part, frac_part)) => (int_part.to_string(), Some(frac_part.to_string())),
        None => (formatted, None),
    };

    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*ch);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    match frac_part {
        Some(frac) => format!("{}{}.{}", sign, grouped, frac),
        None => format!("{}{}", sign, grouped),
    }
}
