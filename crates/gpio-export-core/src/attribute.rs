//! Text form of the `value` and `direction` attributes.
//!
//! Exported lines are read and written as short text tokens, the way a
//! sysfs attribute is:
//!
//! | Attribute   | Read           | Write                                   |
//! |-------------|----------------|-----------------------------------------|
//! | `value`     | `"0\n"`/`"1\n"`| integer token, `0` = low, else high     |
//! | `direction` | `"in\n"`/`"out\n"` | `in`, `out`, `low`, `high`          |
//!
//! Integer tokens follow C `strtol` base detection: `0x` prefix for hex, a
//! leading `0` for octal, decimal otherwise, with an optional sign. A single
//! trailing newline is accepted (what `echo` writes).

use crate::error::AccessError;
use crate::line::{Direction, Level};

/// Render a level as the `value` attribute does.
pub fn format_level(level: Level) -> String {
    format!("{}\n", level)
}

/// Parse a `value` attribute write.
pub fn parse_level(input: &str) -> Result<Level, AccessError> {
    let value = parse_integer(strip_newline(input))
        .ok_or_else(|| AccessError::Malformed(input.to_string()))?;
    Ok(Level::from(value != 0))
}

/// Render a direction as the `direction` attribute does.
pub fn format_direction(direction: Direction) -> String {
    if direction.is_output() {
        "out\n".to_string()
    } else {
        "in\n".to_string()
    }
}

/// Parse a `direction` attribute write.
///
/// `"out"` is an output starting low, same as `"low"`.
pub fn parse_direction(input: &str) -> Result<Direction, AccessError> {
    match strip_newline(input) {
        "in" => Ok(Direction::Input),
        "out" | "low" => Ok(Direction::OutputLow),
        "high" => Ok(Direction::OutputHigh),
        _ => Err(AccessError::Malformed(input.to_string())),
    }
}

fn strip_newline(input: &str) -> &str {
    input.strip_suffix('\n').unwrap_or(input)
}

fn parse_integer(token: &str) -> Option<i64> {
    let (negative, unsigned) = match token.as_bytes().first()? {
        b'-' => (true, &token[1..]),
        b'+' => (false, &token[1..]),
        _ => (false, token),
    };

    let (radix, digits) = if let Some(hex) = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
    {
        (16, hex)
    } else if unsigned.len() > 1 && unsigned.starts_with('0') {
        (8, &unsigned[1..])
    } else {
        (10, unsigned)
    };

    // from_str_radix would accept a second sign here
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }

    let magnitude = i64::from_str_radix(digits, radix).ok()?;
    Some(if negative { -magnitude } else { magnitude })
}
