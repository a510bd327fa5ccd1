use std::{collections::HashSet, str::FromStr};

use anyhow::{anyhow, Result};
use rust_decimal::Decimal;

const NUMBER_ESCAPE_CHAR: &[char] = &[',', ' ', '"', '\r', '\n', '\t'];

/// Parses a `Decimal` value from a given string.
///
/// Thousands separators, quotes and whitespace are removed before parsing;
/// `escape_chars` adds more characters to remove.
///
/// # Example
///
/// ```
/// let s = "1,234.56\n";
/// let decimal_value = parse_decimal(s, None).unwrap();
/// ```
pub fn parse_decimal(s: &str, escape_chars: Option<Vec<char>>) -> Result<Decimal> {
    let cleaned = clean_escape_chars(s, escape_chars);
    if cleaned.is_empty() {
        return Err(anyhow!("Failed to parse '{}' as Decimal because it is empty", s));
    }

    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .map_err(|why| anyhow!("Failed to parse '{}' as Decimal because {:?}", cleaned, why))
}

pub(crate) fn clean_escape_chars(s: &str, escape_chars: Option<Vec<char>>) -> String {
    let mut combined: Vec<char> = NUMBER_ESCAPE_CHAR.to_vec();
    if let Some(ec) = escape_chars {
        combined.extend(ec);
    }

    let filters = combined.iter().collect::<HashSet<_>>();
    s.chars().filter(|c| !filters.contains(c)).collect()
}
