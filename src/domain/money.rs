use std::fmt;

/// Money is represented as integer cents so balances accumulate exactly.
/// 1 unit = 100 cents, so 50.00 = 5000 cents.
pub type Cents = i64;

/// Largest magnitude an amount or balance may have: 2^53 cents. Every value
/// in range survives the trip through a JSON number unchanged.
pub const MAX_CENTS: Cents = 1 << 53;

/// Whether `cents` lies within `-MAX_CENTS..=MAX_CENTS`.
pub fn cents_in_range(cents: Cents) -> bool {
    cents.unsigned_abs() <= MAX_CENTS as u64
}

/// Format cents as a human-readable amount.
/// Example: 5000 -> "50.00", -1234 -> "-12.34"
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs_cents = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs_cents / 100, abs_cents % 100)
}

/// Parse a decimal string typed by a user into cents.
/// Example: "50.00" -> 5000, "12.5" -> 1250, "100" -> 10000
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let input = input.trim();
    let negative = input.starts_with('-');
    let input = input.trim_start_matches('-');

    let (units_str, decimal_str) = match input.split_once('.') {
        Some((units, decimals)) => (units, decimals),
        None => (input, ""),
    };

    if !decimal_str.chars().all(|c| c.is_ascii_digit())
        || (units_str.is_empty() && decimal_str.is_empty())
    {
        return Err(ParseCentsError::InvalidFormat);
    }

    let units: i64 = if units_str.is_empty() {
        0
    } else {
        units_str
            .parse()
            .map_err(|_| ParseCentsError::InvalidFormat)?
    };

    // Pad or truncate the fractional part to exactly two digits
    let mut fraction: String = decimal_str.chars().take(2).collect();
    while fraction.len() < 2 {
        fraction.push('0');
    }
    let decimal_cents: i64 = fraction
        .parse()
        .map_err(|_| ParseCentsError::InvalidFormat)?;

    let cents = units
        .checked_mul(100)
        .and_then(|c| c.checked_add(decimal_cents))
        .filter(|c| cents_in_range(*c))
        .ok_or(ParseCentsError::OutOfRange)?;
    Ok(if negative { -cents } else { cents })
}

/// Convert a JSON number into cents, rounding to the nearest cent.
/// Returns `None` for non-finite numbers and for values beyond [`MAX_CENTS`].
pub fn cents_from_number(value: f64) -> Option<Cents> {
    if !value.is_finite() {
        return None;
    }
    let cents = (value * 100.0).round();
    if cents.abs() > MAX_CENTS as f64 {
        return None;
    }
    Some(cents as Cents)
}

/// Convert cents into the JSON number stored in snapshots.
pub fn cents_to_number(cents: Cents) -> f64 {
    cents as f64 / 100.0
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseCentsError {
    InvalidFormat,
    OutOfRange,
}

impl fmt::Display for ParseCentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseCentsError::InvalidFormat => write!(f, "invalid money format"),
            ParseCentsError::OutOfRange => write!(f, "amount is too large"),
        }
    }
}

impl std::error::Error for ParseCentsError {}

/// Serde adapter that stores cents as a plain JSON number (`50.0`, `-20.5`).
pub mod amount_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{Cents, cents_from_number, cents_to_number};

    pub fn serialize<S: Serializer>(cents: &Cents, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(cents_to_number(*cents))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Cents, D::Error> {
        let value = f64::deserialize(deserializer)?;
        cents_from_number(value)
            .ok_or_else(|| serde::de::Error::custom(format!("amount {} is out of range", value)))
    }
}
