//! Time source abstraction.
//!
//! Everything that compares against "now" (expiry, name-history windows,
//! duration parsing) reads it through a [`Clock`] so tests can move time
//! without sleeping.

use std::sync::Mutex;

use chrono::{DateTime, SubsecRound as _, TimeDelta, Utc};

pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time, truncated to whole seconds like every stored timestamp.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> { Utc::now().trunc_subsecs(0) }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
  now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
  pub fn new(start: DateTime<Utc>) -> Self {
    Self { now: Mutex::new(start.trunc_subsecs(0)) }
  }

  /// Start at the given Unix timestamp.
  pub fn at(secs: i64) -> Self {
    Self::new(DateTime::from_timestamp(secs, 0).unwrap_or_default())
  }

  pub fn advance(&self, by: TimeDelta) {
    let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
    *now += by;
  }

  pub fn set(&self, to: DateTime<Utc>) {
    *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to.trunc_subsecs(0);
  }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> {
    *self.now.lock().unwrap_or_else(|e| e.into_inner())
  }
}
