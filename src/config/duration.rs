//! Interval parsing and human-readable formatting.

use std::time::Duration;

use super::ConfigError;

const MILLIS_PER_SECOND: u64 = 1_000;
const MILLIS_PER_MINUTE: u64 = 60 * MILLIS_PER_SECOND;
const MILLIS_PER_HOUR: u64 = 60 * MILLIS_PER_MINUTE;
const MILLIS_PER_DAY: u64 = 24 * MILLIS_PER_HOUR;

/// Parse an interval such as `1500`, `30s`, `15m`, `2h` or `1d`.
///
/// A bare number is taken as milliseconds. `ms` is accepted as an explicit
/// millisecond suffix.
///
/// # Errors
///
/// Returns `ConfigError::UnknownSuffix` for an unrecognized unit and
/// `ConfigError::InvalidDuration` when there is no number or it overflows.
pub fn parse_interval(input: &str) -> Result<Duration, ConfigError> {
    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, suffix) = trimmed.split_at(split);

    if digits.is_empty() {
        return Err(ConfigError::InvalidDuration(input.to_string()));
    }

    let unit = match suffix.trim_start() {
        "" | "ms" => 1,
        "s" => MILLIS_PER_SECOND,
        "m" => MILLIS_PER_MINUTE,
        "h" => MILLIS_PER_HOUR,
        "d" => MILLIS_PER_DAY,
        other => {
            return Err(ConfigError::UnknownSuffix {
                input: input.to_string(),
                suffix: other.to_string(),
            })
        }
    };

    digits
        .parse::<u64>()
        .ok()
        .and_then(|value| value.checked_mul(unit))
        .map(Duration::from_millis)
        .ok_or_else(|| ConfigError::InvalidDuration(input.to_string()))
}

/// Format a duration for status lines: `250ms`, `42s`, `3m 5s`,
/// `1h 0m 12s` or `2d 3h 0m 0s`.
#[must_use]
pub fn humanize(duration: Duration) -> String {
    let total = duration.as_secs();
    if total == 0 {
        return format!("{}ms", duration.subsec_millis());
    }

    let days = total / 86_400;
    let hours = total % 86_400 / 3_600;
    let minutes = total % 3_600 / 60;
    let seconds = total % 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m {seconds}s")
    } else if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
