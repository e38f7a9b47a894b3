use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntervalError {
    #[error("empty interval")]
    Empty,

    #[error("invalid interval {0:?}, use a format like '30s', '1m' or '1h30m'")]
    Malformed(String),

    #[error("missing unit in interval {0:?}")]
    MissingUnit(String),

    #[error("unknown unit {unit:?} in interval {input:?}")]
    UnknownUnit { unit: String, input: String },

    #[error("interval must be greater than zero: {0:?}")]
    NotPositive(String),
}

const NANOS_PER_SEC: f64 = 1e9;

fn unit_nanos(unit: &str) -> Option<f64> {
    let nanos = match unit {
        "ns" => 1.0,
        "us" | "µs" | "μs" => 1e3,
        "ms" => 1e6,
        "s" => NANOS_PER_SEC,
        "m" => 60.0 * NANOS_PER_SEC,
        "h" => 3600.0 * NANOS_PER_SEC,
        "d" => 86400.0 * NANOS_PER_SEC,
        _ => return None,
    };
    Some(nanos)
}

/// Parse interval strings like "30s", "1m", "1h30m", "1.5h" or "250ms".
///
/// A bare integer is taken as seconds.
pub fn parse_interval(s: &str) -> Result<Duration, IntervalError> {
    let input = s.trim();
    if input.is_empty() {
        return Err(IntervalError::Empty);
    }
    if input.starts_with('-') {
        return Err(IntervalError::NotPositive(input.to_string()));
    }
    let body = input.strip_prefix('+').unwrap_or(input);

    if !body.is_empty() && body.bytes().all(|b| b.is_ascii_digit()) {
        let secs: u64 = body
            .parse()
            .map_err(|_| IntervalError::Malformed(input.to_string()))?;
        return positive(Duration::from_secs(secs), input);
    }

    let is_number = |c: char| c.is_ascii_digit() || c == '.';
    let mut rest = body;
    let mut total_nanos = 0.0_f64;

    while !rest.is_empty() {
        let (number, tail) = rest.split_at(rest.find(|c| !is_number(c)).unwrap_or(rest.len()));
        if number.is_empty() || number == "." {
            return Err(IntervalError::Malformed(input.to_string()));
        }
        let value: f64 = number
            .parse()
            .map_err(|_| IntervalError::Malformed(input.to_string()))?;

        let (unit, next) = tail.split_at(tail.find(is_number).unwrap_or(tail.len()));
        if unit.is_empty() {
            return Err(IntervalError::MissingUnit(input.to_string()));
        }
        let scale = unit_nanos(unit).ok_or_else(|| IntervalError::UnknownUnit {
            unit: unit.to_string(),
            input: input.to_string(),
        })?;

        total_nanos += value * scale;
        rest = next;
    }

    if !total_nanos.is_finite() || total_nanos >= u64::MAX as f64 {
        return Err(IntervalError::Malformed(input.to_string()));
    }
    positive(Duration::from_nanos(total_nanos.round() as u64), input)
}

fn positive(d: Duration, input: &str) -> Result<Duration, IntervalError> {
    if d.is_zero() {
        Err(IntervalError::NotPositive(input.to_string()))
    } else {
        Ok(d)
    }
}

/// Format an interval in the largest unit that divides it evenly.
pub fn format_interval(d: Duration) -> String {
    const UNITS: [(&str, u128); 7] = [
        ("d", 86_400_000_000_000),
        ("h", 3_600_000_000_000),
        ("m", 60_000_000_000),
        ("s", 1_000_000_000),
        ("ms", 1_000_000),
        ("us", 1_000),
        ("ns", 1),
    ];

    let nanos = d.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }
    UNITS
        .iter()
        .find(|(_, size)| nanos % size == 0)
        .map(|(unit, size)| format!("{}{}", nanos / size, unit))
        .unwrap_or_else(|| format!("{}ns", nanos))
}
