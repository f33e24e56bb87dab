//! Human-authored duration strings such as `30m`, `1d` or `2w3d12h`.
//!
//! The grammar is a run of `<digits><unit>` tokens with no separators. Units
//! are `s`, `m`, `h`, `d`, `w` and `y` (a year is always 365 days). Parsing is
//! lenient: an unknown unit character silently discards the digits before it,
//! digits with no trailing unit are dropped, and nothing is ever rejected. A
//! string that contributes no time at all means "permanent".

use chrono::{DateTime, Utc};

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;
const WEEK: u64 = 7 * DAY;
const YEAR: u64 = 365 * DAY;

fn unit_seconds(unit: char) -> Option<u64> {
  match unit {
    's' => Some(1),
    'm' => Some(MINUTE),
    'h' => Some(HOUR),
    'd' => Some(DAY),
    'w' => Some(WEEK),
    'y' => Some(YEAR),
    _ => None,
  }
}

/// Total number of seconds described by `spec`. Saturates on overflow.
pub fn total_seconds(spec: &str) -> u64 {
  let mut sum: u64 = 0;
  let mut amount: u64 = 0;

  for c in spec.chars() {
    if let Some(digit) = c.to_digit(10) {
      amount = amount.saturating_mul(10).saturating_add(u64::from(digit));
      continue;
    }
    if let Some(unit) = unit_seconds(c) {
      sum = sum.saturating_add(amount.saturating_mul(unit));
    }
    amount = 0;
  }

  sum
}

/// Parse `spec` into an absolute expiry relative to `now`.
///
/// Returns `None` ("never expires") when the string sums to zero seconds,
/// which includes empty, malformed and `0s` input. Callers must treat `None`
/// as a normal outcome, not a parse failure.
pub fn parse_duration(spec: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
  let sum = total_seconds(spec);
  if sum == 0 {
    return None;
  }

  let secs = i64::try_from(sum).unwrap_or(i64::MAX);
  let at = now.timestamp().saturating_add(secs);
  Some(DateTime::from_timestamp(at, 0).unwrap_or(DateTime::<Utc>::MAX_UTC))
}
