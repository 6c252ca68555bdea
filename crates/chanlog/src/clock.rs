//! Millisecond timestamps for new envelopes.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall clock used to stamp envelopes.
///
/// # Rules
///
/// - **Monotonic** (default): each reading is `max(wall_clock, last + 1)`, so
///   two posts made through one clock never share a timestamp, even within a
///   millisecond or across a backwards wall-clock step.
/// - **Raw**: readings are the wall clock as is.
/// - **Chain successor**: [`Clock::after`] never returns a value at or below
///   the previous entry's timestamp, whichever mode is active.
///
/// Readings are only ordered within one clock. Clocks of different processes
/// are assumed roughly synchronized and nothing here corrects for skew.
#[derive(Debug)]
pub struct Clock {
    monotonic: bool,
    last: AtomicI64,
}

impl Clock {
    pub fn new(monotonic: bool) -> Self {
        Self {
            monotonic,
            last: AtomicI64::new(i64::MIN),
        }
    }

    /// Current timestamp in Unix milliseconds.
    pub fn now(&self) -> i64 {
        let wall = wall_clock_ms();
        if !self.monotonic {
            return wall;
        }

        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let next = wall.max(last.saturating_add(1));
            match self
                .last
                .compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => last = actual,
            }
        }
    }

    /// Timestamp for an entry that follows one stamped `previous`.
    pub fn after(&self, previous: Option<i64>) -> i64 {
        let now = self.now();
        match previous {
            Some(prev) if now <= prev => {
                let bumped = prev.saturating_add(1);
                if self.monotonic {
                    self.last.fetch_max(bumped, Ordering::AcqRel);
                }
                bumped
            }
            _ => now,
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(true)
    }
}

fn wall_clock_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_readings_strictly_increase() {
        let clock = Clock::new(true);
        let mut prev = clock.now();
        for _ in 0..1_000 {
            let next = clock.now();
            assert!(next > prev);
            prev = next;
        }
    }

    #[test]
    fn test_after_future_previous() {
        let clock = Clock::new(true);
        let future = clock.now() + 60_000;
        let ts = clock.after(Some(future));
        assert_eq!(ts, future + 1);
        assert!(clock.now() > ts);
    }

    #[test]
    fn test_raw_clock_still_respects_chain() {
        let clock = Clock::new(false);
        let future = clock.now() + 60_000;
        assert_eq!(clock.after(Some(future)), future + 1);
        assert!(clock.after(None) <= future);
    }
}
