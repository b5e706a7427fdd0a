//! Time representation for the event scheduler.
//!
//! All scheduling decisions are made on a single wall-clock timeline:
//! [`Timestamp`] counts **microseconds since the Unix epoch**.  The wall
//! clock is required because aligned events snap to calendar boundaries
//! (every minute on the minute, every hour on the hour), and the same clock
//! is used for construction and dispatch so the two never disagree.
//!
//! # Improvements over the C++ implementation
//!
//! | C++ issue | Rust fix |
//! |-----------|----------|
//! | `struct timeval` pairs with a manual carry in `Timeval::add` | single `u64` µs count, carry is implicit |
//! | `doAlign` goes through `double`, losing precision past 2^53 µs | integer arithmetic in [`align`] |
//! | Overflow on `when + ival` is silent | `checked_*`; overflow surfaces as an error |
//! | Global `Timeval::g_time` for trace replay | [`ManualClock`] instance owned by the caller |

pub mod align;
pub mod clock;

pub use clock::{Clock, ClockError, ManualClock, SystemClock};

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

// ── Constants ─────────────────────────────────────────────────────────────────

pub const MICROS_PER_SEC: u64 = 1_000_000;
pub const MICROS_PER_MILLI: u64 = 1_000;

// ── Timestamp ─────────────────────────────────────────────────────────────────

/// Absolute point on the wall-clock timeline, µs since 1970-01-01T00:00:00Z.
///
/// This is also the alignment epoch: an aligned event with interval `I`
/// fires at instants that are exact multiples of `I` from here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The Unix epoch.
    pub const EPOCH: Timestamp = Timestamp(0);

    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Build from a `(seconds, microseconds)` pair, normalising a
    /// microsecond part of one second or more.
    ///
    /// Returns `None` if the result does not fit.
    pub fn from_secs_micros(secs: u64, micros: u64) -> Option<Self> {
        secs.checked_mul(MICROS_PER_SEC)?
            .checked_add(micros)
            .map(Self)
    }

    /// Convert a `SystemTime`.  Instants before the epoch clamp to it.
    pub fn from_system_time(t: SystemTime) -> Self {
        match t.duration_since(UNIX_EPOCH) {
            Ok(d) => Self(duration_to_micros(d).unwrap_or(u64::MAX)),
            Err(_) => Self::EPOCH,
        }
    }

    pub const fn as_micros(self) -> u64 {
        self.0
    }

    /// Whole seconds since the epoch.
    pub const fn secs(self) -> u64 {
        self.0 / MICROS_PER_SEC
    }

    /// Sub-second part, in µs.
    pub const fn subsec_micros(self) -> u32 {
        (self.0 % MICROS_PER_SEC) as u32
    }

    pub fn checked_add(self, d: Duration) -> Option<Self> {
        self.0.checked_add(duration_to_micros(d)?).map(Self)
    }

    /// `self - earlier`, or zero if `earlier` is later (C++
    /// `Timeval::sub0`).
    pub fn saturating_sub(self, earlier: Timestamp) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}", self.secs(), self.subsec_micros())
    }
}

/// Whole microseconds in `d`, or `None` if they do not fit a `u64`.
///
/// Sub-microsecond remainders are dropped.
pub fn duration_to_micros(d: Duration) -> Option<u64> {
    u64::try_from(d.as_micros()).ok()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secs_micros_round_trip() {
        let t = Timestamp::from_secs_micros(1_700_000_000, 250_000).unwrap();
        assert_eq!(t.secs(), 1_700_000_000);
        assert_eq!(t.subsec_micros(), 250_000);
        assert_eq!(t.to_string(), "1700000000.250000");
    }

    #[test]
    fn micros_part_is_normalised() {
        // 1.5 s expressed as 0 s + 1_500_000 µs
        let t = Timestamp::from_secs_micros(0, 1_500_000).unwrap();
        assert_eq!(t.secs(), 1);
        assert_eq!(t.subsec_micros(), 500_000);
    }

    #[test]
    fn from_secs_micros_overflow_is_none() {
        assert!(Timestamp::from_secs_micros(u64::MAX, 0).is_none());
    }

    #[test]
    fn checked_add_carries_into_seconds() {
        let t = Timestamp::from_secs_micros(10, 900_000).unwrap();
        let later = t.checked_add(Duration::from_micros(200_000)).unwrap();
        assert_eq!(later.secs(), 11);
        assert_eq!(later.subsec_micros(), 100_000);
    }

    #[test]
    fn checked_add_overflow_is_none() {
        let t = Timestamp::from_micros(u64::MAX - 1);
        assert!(t.checked_add(Duration::from_micros(2)).is_none());
    }

    #[test]
    fn saturating_sub_never_negative() {
        let a = Timestamp::from_micros(5_000);
        let b = Timestamp::from_micros(8_000);
        assert_eq!(b.saturating_sub(a), Duration::from_micros(3_000));
        assert_eq!(a.saturating_sub(b), Duration::ZERO);
    }

    #[test]
    fn system_time_before_epoch_clamps() {
        let before = UNIX_EPOCH - Duration::from_secs(1);
        assert_eq!(Timestamp::from_system_time(before), Timestamp::EPOCH);
    }

    #[test]
    fn ordering_follows_micros() {
        assert!(Timestamp::from_micros(1) < Timestamp::from_micros(2));
        assert_eq!(Timestamp::default(), Timestamp::EPOCH);
    }
}
