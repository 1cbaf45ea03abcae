use chrono::{DateTime, TimeZone, Utc};
use std::time::Duration;

/// Parses durations written as a sequence of decimal numbers with a unit
/// suffix, e.g. `300ms`, `1.5h` or `2h45m`.
///
/// Accepted units are `ns`, `us`, `ms`, `s`, `m` and `h`. A bare `0` is
/// accepted and yields a zero duration.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let input = raw.trim();
    if input.is_empty() {
        return Err("empty duration".to_string());
    }
    if input == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total_nanos: f64 = 0.0;
    let mut rest = input;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return Err(format!("invalid duration {:?}", raw));
        }
        let (number, tail) = rest.split_at(number_len);
        let value: f64 = number
            .parse()
            .map_err(|_| format!("invalid number {:?} in duration {:?}", number, raw))?;

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        let scale = match unit {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60.0 * 1e9,
            "h" => 3600.0 * 1e9,
            "" => return Err(format!("missing unit in duration {:?}", raw)),
            other => return Err(format!("unknown unit {:?} in duration {:?}", other, raw)),
        };
        total_nanos += value * scale;
        rest = tail;
    }

    if !total_nanos.is_finite() || total_nanos > u64::MAX as f64 {
        return Err(format!("duration {:?} out of range", raw));
    }
    Ok(Duration::from_nanos(total_nanos.round() as u64))
}

/// Converts unix seconds back into a UTC timestamp, clamping invalid values to the epoch.
pub fn from_unix_seconds(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .unwrap_or_default()
}
