//! Duration string parsing for blobstage
//!
//! SAS timing parameters are given as short time-unit strings such as
//! "5m", "24h" or "1h 30m" and are used as whole minutes.

use crate::error::{BlobstageError, Result};
use regex::Regex;

/// Parse a duration string into whole minutes.
///
/// Accepts one or more `<number><unit>` terms, optionally separated by
/// whitespace. Supported units: `s`, `m`/`min`, `h`, `d`, `w`. A bare
/// integer is taken as minutes. Seconds are truncated toward zero.
pub fn parse_minutes(input: &str) -> Result<i64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(BlobstageError::invalid_argument(
            "Duration cannot be empty. Expected a value like '5m', '24h' or '1h 30m'",
        ));
    }

    if let Ok(minutes) = trimmed.parse::<i64>() {
        return Ok(minutes);
    }

    let term = Regex::new(r"(\d+)\s*(min|[smhdw])").unwrap();
    let mut seconds: i64 = 0;
    let mut consumed = 0;

    for captures in term.captures_iter(trimmed) {
        let whole = captures.get(0).unwrap();
        if !trimmed[consumed..whole.start()].trim().is_empty() {
            return Err(invalid_duration(trimmed));
        }
        consumed = whole.end();

        let value: i64 = captures[1].parse().map_err(|_| {
            BlobstageError::invalid_argument(format!("Invalid number in duration: {}", &captures[1]))
        })?;

        let unit_seconds = match &captures[2] {
            "s" => 1,
            "m" | "min" => 60,
            "h" => 60 * 60,
            "d" => 24 * 60 * 60,
            "w" => 7 * 24 * 60 * 60,
            other => {
                return Err(BlobstageError::invalid_argument(format!(
                    "Unknown duration unit: {}",
                    other
                )))
            }
        };

        seconds = value
            .checked_mul(unit_seconds)
            .and_then(|s| seconds.checked_add(s))
            .ok_or_else(|| {
                BlobstageError::invalid_argument(format!("Duration '{}' is too large", trimmed))
            })?;
    }

    if consumed == 0 || !trimmed[consumed..].trim().is_empty() {
        return Err(invalid_duration(trimmed));
    }

    Ok(seconds / 60)
}

fn invalid_duration(input: &str) -> BlobstageError {
    BlobstageError::invalid_argument(format!(
        "Invalid duration format: '{}'. Expected a value like '5m', '24h' or '1h 30m'",
        input
    ))
}
