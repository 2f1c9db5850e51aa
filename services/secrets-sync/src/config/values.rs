//! Scalar value parsing: durations and file modes.

use std::time::Duration;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Parse a duration such as `30s`, `5m`, `1h30m` or `1.5h`.
///
/// Accepted units are `ns`, `us` (or `µs`), `ms`, `s`, `m` and `h`. A bare
/// `0` is the zero duration; any other number needs a unit.
///
/// # Errors
///
/// Returns a description of the problem for malformed or negative input.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let text = input.trim();
    if text.is_empty() {
        return Err("empty duration".to_string());
    }
    if text == "0" {
        return Ok(Duration::ZERO);
    }
    if text.starts_with('-') {
        return Err("duration must not be negative".to_string());
    }

    let mut rest = text.strip_prefix('+').unwrap_or(text);
    let mut total: u128 = 0;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let number = &rest[..number_end];
        rest = &rest[number_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_end];
        rest = &rest[unit_end..];

        let scale = unit_scale(unit)?;
        total = scaled(number, scale)
            .and_then(|nanos| total.checked_add(nanos))
            .ok_or_else(|| format!("invalid number {number:?}"))?;
    }

    let secs = u64::try_from(total / NANOS_PER_SEC).map_err(|_| "duration too large".to_string())?;
    let nanos = u32::try_from(total % NANOS_PER_SEC).map_err(|_| "duration too large".to_string())?;
    Ok(Duration::new(secs, nanos))
}

fn unit_scale(unit: &str) -> Result<u128, String> {
    match unit {
        "ns" => Ok(1),
        "us" | "µs" | "μs" => Ok(1_000),
        "ms" => Ok(1_000_000),
        "s" => Ok(NANOS_PER_SEC),
        "m" => Ok(60 * NANOS_PER_SEC),
        "h" => Ok(3600 * NANOS_PER_SEC),
        "" => Err("missing unit".to_string()),
        other => Err(format!("unknown unit {other:?}")),
    }
}

// `number` may carry a fractional part; fractions below a nanosecond are dropped.
fn scaled(number: &str, scale: u128) -> Option<u128> {
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if (whole.is_empty() && fraction.is_empty()) || fraction.contains('.') {
        return None;
    }
    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut nanos = whole.checked_mul(scale)?;
    if !fraction.is_empty() {
        let digits = &fraction[..fraction.len().min(18)];
        let value: u128 = digits.parse().ok()?;
        let divisor = 10u128.pow(u32::try_from(digits.len()).ok()?);
        nanos = nanos.checked_add(value * scale / divisor)?;
    }
    Some(nanos)
}

/// Parse an octal permission string such as `0644`, `644` or `0o600`.
///
/// # Errors
///
/// Returns a description for non-octal input or bits outside `0o777`.
pub fn parse_mode(input: &str) -> Result<u32, String> {
    let text = input.trim();
    let digits = text.strip_prefix("0o").unwrap_or(text);
    if digits.is_empty() || digits.len() > 4 {
        return Err(format!("{text:?} is not an octal mode"));
    }
    let mode = u32::from_str_radix(digits, 8).map_err(|_| format!("{text:?} is not an octal mode"))?;
    if mode > 0o777 {
        return Err(format!("{text:?} sets bits outside 0777"));
    }
    Ok(mode)
}

/// Read an integer mode the way `chmod` does: its decimal digits are the
/// octal digits, so `644` means `0o644`.
///
/// # Errors
///
/// Returns a description when a digit is 8 or 9 or the mode exceeds `0o777`.
pub fn mode_from_integer(value: u64) -> Result<u32, String> {
    parse_mode(&value.to_string())
}
