//! Time source for block timestamps.
//!
//! The engine never calls the system clock directly; it asks a [`Clock`], so
//! tests can pin timestamps and assert on exact ledger bytes.

use std::cell::Cell;

use chrono::Utc;

/// Seconds since the Unix epoch, UTC.
pub trait Clock {
    fn now(&self) -> f64;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        Utc::now().timestamp_micros() as f64 / 1_000_000.0
    }
}

/// A deterministic clock that starts at a fixed instant and advances by
/// `step` seconds on every reading.
#[derive(Debug, Clone)]
pub struct FixedClock {
    next: Cell<f64>,
    step: f64,
}

impl FixedClock {
    /// Always reads `at`.
    pub fn new(at: f64) -> Self {
        Self::stepping(at, 0.0)
    }

    /// Reads `start`, then `start + step`, and so on.
    pub fn stepping(start: f64, step: f64) -> Self {
        Self {
            next: Cell::new(start),
            step,
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> f64 {
        let now = self.next.get();
        self.next.set(now + self.step);
        now
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> f64 {
        (**self).now()
    }
}
