//! Time source for timestamps and `until` waits.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

/// A clock that only moves when told to. Millisecond resolution.
#[derive(Debug)]
pub struct ManualClock {
  millis: AtomicI64,
}

impl ManualClock {
  pub fn new(start: DateTime<Utc>) -> Self {
    Self {
      millis: AtomicI64::new(start.timestamp_millis()),
    }
  }

  pub fn advance(&self, ms: u64) {
    let ms = i64::try_from(ms).unwrap_or(i64::MAX);
    self.millis.fetch_add(ms, Ordering::SeqCst);
  }

  pub fn set(&self, now: DateTime<Utc>) {
    self.millis.store(now.timestamp_millis(), Ordering::SeqCst);
  }
}

impl Default for ManualClock {
  fn default() -> Self {
    Self::new(DateTime::<Utc>::default())
  }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
  }
}
