//! Relative time resolution
//!
//! Alert times are given relative to the moment the alert is built: either the
//! literal `now`, or a signed duration in the compound notation used by the
//! original command line tools (`10s`, `+10m`, `-5h`, `1h30m`, `1.5h`).
//!
//! Accepted units are `ns`, `us` (also `µs`/`μs`), `ms`, `s`, `m` and `h`.
//! A bare `0` is allowed without a unit.

use std::sync::LazyLock;

use chrono::{DateTime, TimeDelta, Utc};
use regex::Regex;

use crate::error::{RelayError, RelayResult};

const NOW: &str = "now";

static DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-+]?(?:0|(?:(?:\d+\.?\d*|\.\d+)(?:ns|us|µs|μs|ms|s|m|h))+)$")
        .expect("duration pattern is valid")
});

static COMPONENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d*)(?:\.(\d*))?(ns|us|µs|μs|ms|s|m|h)").expect("component pattern is valid")
});

fn unit_nanos(unit: &str) -> i128 {
    match unit {
        "ns" => 1,
        "us" | "µs" | "μs" => 1_000,
        "ms" => 1_000_000,
        "s" => 1_000_000_000,
        "m" => 60 * 1_000_000_000,
        // the pattern only admits the units above, so this is hours
        _ => 3_600 * 1_000_000_000,
    }
}

fn invalid(spec: &str) -> RelayError {
    RelayError::InvalidTimeSpec {
        field: None,
        spec: spec.to_string(),
    }
}

/// Parse a signed compound duration such as `+10m`, `-5h` or `1h30m15s`
pub fn parse_duration(spec: &str) -> RelayResult<TimeDelta> {
    if !DURATION.is_match(spec) {
        return Err(invalid(spec));
    }

    let (negative, body) = match spec.as_bytes().first() {
        Some(b'-') => (true, &spec[1..]),
        Some(b'+') => (false, &spec[1..]),
        _ => (false, spec),
    };

    let mut total: i128 = 0;
    for caps in COMPONENT.captures_iter(body) {
        let unit = unit_nanos(&caps[3]);

        let whole = match &caps[1] {
            "" => 0,
            digits => digits.parse::<i128>().map_err(|_| invalid(spec))?,
        };
        let mut nanos = whole.checked_mul(unit).ok_or_else(|| invalid(spec))?;

        if let Some(fraction) = caps.get(2).map(|m| m.as_str())
            && !fraction.is_empty()
        {
            // anything past 18 digits is below nanosecond resolution for every unit
            let fraction = &fraction[..fraction.len().min(18)];
            let scale = 10i128.pow(fraction.len() as u32);
            let value = fraction.parse::<i128>().map_err(|_| invalid(spec))?;
            nanos += value * unit / scale;
        }

        total = total.checked_add(nanos).ok_or_else(|| invalid(spec))?;
    }

    if total > i64::MAX as i128 {
        return Err(invalid(spec));
    }

    let delta = TimeDelta::nanoseconds(total as i64);
    Ok(if negative { -delta } else { delta })
}

/// Resolve a time specifier against `now`
///
/// `now` yields the reference point unchanged, anything else is parsed as a
/// signed duration and added to it. An empty specifier means the field was not
/// requested; callers skip resolution for it, so it is rejected here.
pub fn resolve(spec: &str, now: DateTime<Utc>) -> RelayResult<DateTime<Utc>> {
    if spec == NOW {
        return Ok(now);
    }

    let offset = parse_duration(spec)?;
    now.checked_add_signed(offset).ok_or_else(|| invalid(spec))
}

/// Seconds since the Unix epoch, clamped at zero
pub fn unix_seconds(time: DateTime<Utc>) -> u64 {
    time.timestamp().max(0) as u64
}
