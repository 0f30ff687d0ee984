use chrono::{Local, Timelike};

/// Source of the current wall-clock minute.
pub trait Clock: Send + Sync {
  /// Minute of the hour, `0..=59`.
  fn minute(&self) -> u32;
}

/// Local time from the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn minute(&self) -> u32 {
    Local::now().minute()
  }
}

/// Always reports the same minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub u32);

impl Clock for FixedClock {
  fn minute(&self) -> u32 {
    self.0
  }
}
