//! Sources of "now".
//!
//! [`SystemClock`] reads the wall clock and is what the binary uses.
//! [`ManualClock`] is set explicitly (by tests, or when replaying a trace
//! whose timestamps drive the schedule) and refuses to move backwards.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use thiserror::Error;

use super::{duration_to_micros, Timestamp};

/// Provider of the current wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

// ── SystemClock ───────────────────────────────────────────────────────────────

/// The operating-system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_system_time(SystemTime::now())
    }
}

// ── ManualClock ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClockError {
    /// A replayed timestamp is older than the current clock reading.
    #[error("clock cannot move backwards: {requested} is before {current}")]
    Backwards {
        current: Timestamp,
        requested: Timestamp,
    },
}

/// Explicitly driven clock.  Shareable between threads.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_us: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now_us: AtomicU64::new(start.as_micros()),
        }
    }

    /// Jump to `t`.  Moving backwards is rejected and leaves the clock as is.
    pub fn set(&self, t: Timestamp) -> Result<(), ClockError> {
        let requested = t.as_micros();
        self.now_us
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |cur| {
                (requested >= cur).then_some(requested)
            })
            .map(|_| ())
            .map_err(|cur| ClockError::Backwards {
                current: Timestamp::from_micros(cur),
                requested: t,
            })
    }

    /// Move forward by `d` (saturating) and return the new reading.
    pub fn advance(&self, d: Duration) -> Timestamp {
        let step = duration_to_micros(d).unwrap_or(u64::MAX);
        let prev = self
            .now_us
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |cur| {
                Some(cur.saturating_add(step))
            })
            .unwrap_or_else(|cur| cur);
        Timestamp::from_micros(prev.saturating_add(step))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_micros(self.now_us.load(Ordering::SeqCst))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_after_2020() {
        // 2020-01-01T00:00:00Z
        assert!(SystemClock.now().secs() > 1_577_836_800);
    }

    #[test]
    fn manual_clock_set_and_advance() {
        let clock = ManualClock::new(Timestamp::from_micros(1_000));
        assert_eq!(clock.now(), Timestamp::from_micros(1_000));

        clock.set(Timestamp::from_micros(5_000)).unwrap();
        assert_eq!(clock.now(), Timestamp::from_micros(5_000));

        let t = clock.advance(Duration::from_millis(2));
        assert_eq!(t, Timestamp::from_micros(7_000));
        assert_eq!(clock.now(), t);
    }

    #[test]
    fn manual_clock_rejects_backwards() {
        let clock = ManualClock::new(Timestamp::from_micros(10_000));
        let err = clock.set(Timestamp::from_micros(9_999)).unwrap_err();
        assert_eq!(
            err,
            ClockError::Backwards {
                current: Timestamp::from_micros(10_000),
                requested: Timestamp::from_micros(9_999),
            }
        );
        assert_eq!(clock.now(), Timestamp::from_micros(10_000));
    }

    #[test]
    fn manual_clock_allows_same_instant() {
        let clock = ManualClock::new(Timestamp::from_micros(42));
        assert!(clock.set(Timestamp::from_micros(42)).is_ok());
    }

    #[test]
    fn arc_clock_delegates() {
        let clock = Arc::new(ManualClock::new(Timestamp::from_micros(3)));
        assert_eq!(Clock::now(&clock), Timestamp::from_micros(3));
    }
}
