/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Pure arithmetic for interval boundaries and re-arming.
//!
//! Everything here works on raw microsecond counts so it can be tested
//! independently of [`Event`](crate::event::Event).  A *boundary* is any
//! multiple of the interval measured from the Unix epoch.
//!
//! All functions return `None` on `u64` overflow or when `ival` is zero.

/// Next due time produced by a re-arm, plus how many occurrences were
/// skipped because the dispatch came late.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rearm {
    pub due_us: u64,
    pub skipped: u64,
}

/// `true` if `t` lies exactly on a boundary of `ival`.
pub fn is_aligned(t: u64, ival: u64) -> bool {
    ival != 0 && t % ival == 0
}

/// First boundary strictly after `t`.
///
/// This is the construction-time alignment rule: an event requested for
/// 00:00:37 with a 60 s interval is placed on 00:01:00, and one requested
/// exactly on 00:01:00 moves to 00:02:00.
pub fn next_boundary_after(t: u64, ival: u64) -> Option<u64> {
    if ival == 0 {
        return None;
    }
    (t / ival).checked_add(1)?.checked_mul(ival)
}

/// Smallest boundary `>= t`.
pub fn boundary_at_or_after(t: u64, ival: u64) -> Option<u64> {
    if ival == 0 {
        return None;
    }
    if t % ival == 0 {
        Some(t)
    } else {
        next_boundary_after(t, ival)
    }
}

/// Re-arm an unaligned periodic event that was due at `due`.
///
/// The next due time is `due + k·ival` for the smallest `k >= 1` that puts it
/// strictly after `now`.  `skipped` is `k - 1`.
pub fn rearm_free(due: u64, ival: u64, now: u64) -> Option<Rearm> {
    if ival == 0 {
        return None;
    }
    let candidate = due.checked_add(ival)?;
    if candidate > now {
        return Some(Rearm {
            due_us: candidate,
            skipped: 0,
        });
    }
    let k = (now - due) / ival + 1;
    let due_us = due.checked_add(k.checked_mul(ival)?)?;
    Some(Rearm {
        due_us,
        skipped: k - 1,
    })
}

/// Re-arm an aligned periodic event that was due at `due`.
///
/// The next due time is the smallest boundary that is both `>= due + ival`
/// and strictly after `now`.  Missed boundaries are skipped, never replayed.
pub fn rearm_aligned(due: u64, ival: u64, now: u64) -> Option<Rearm> {
    let candidate = boundary_at_or_after(due.checked_add(ival)?, ival)?;
    if candidate > now {
        return Some(Rearm {
            due_us: candidate,
            skipped: 0,
        });
    }
    let due_us = next_boundary_after(now, ival)?;
    Some(Rearm {
        due_us,
        skipped: (due_us - candidate) / ival,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const SEC: u64 = 1_000_000;

    // ── boundaries ────────────────────────────────────────────────────────────

    #[test]
    fn next_boundary_after_mid_interval() {
        assert_eq!(next_boundary_after(37 * SEC, 60 * SEC), Some(60 * SEC));
    }

    #[test]
    fn next_boundary_after_on_boundary_moves_forward() {
        assert_eq!(next_boundary_after(60 * SEC, 60 * SEC), Some(120 * SEC));
    }

    #[test]
    fn boundary_at_or_after_keeps_exact_boundary() {
        assert_eq!(boundary_at_or_after(120 * SEC, 60 * SEC), Some(120 * SEC));
        assert_eq!(boundary_at_or_after(121 * SEC, 60 * SEC), Some(180 * SEC));
    }

    #[test]
    fn zero_interval_is_none() {
        assert_eq!(next_boundary_after(5, 0), None);
        assert_eq!(boundary_at_or_after(5, 0), None);
        assert_eq!(rearm_free(5, 0, 10), None);
        assert_eq!(rearm_aligned(5, 0, 10), None);
        assert!(!is_aligned(5, 0));
    }

    #[test]
    fn boundary_overflow_is_none() {
        assert_eq!(next_boundary_after(u64::MAX - 1, u64::MAX / 2), None);
    }

    // ── rearm_free ────────────────────────────────────────────────────────────

    #[test]
    fn free_rearm_on_time_adds_one_interval() {
        let r = rearm_free(100, 50, 100).unwrap();
        assert_eq!(r, Rearm { due_us: 150, skipped: 0 });
    }

    #[test]
    fn free_rearm_late_skips_to_future() {
        // due 100, ival 50, now 260 → 150, 200, 250 are past; 300 is next
        let r = rearm_free(100, 50, 260).unwrap();
        assert_eq!(r.due_us, 300);
        assert_eq!(r.skipped, 3);
    }

    #[test]
    fn free_rearm_exactly_on_missed_occurrence() {
        // now == 200 is itself not "strictly after"
        let r = rearm_free(100, 50, 200).unwrap();
        assert_eq!(r.due_us, 250);
        assert_eq!(r.skipped, 2);
    }

    // ── rearm_aligned ─────────────────────────────────────────────────────────

    #[test]
    fn aligned_rearm_on_time() {
        let r = rearm_aligned(60 * SEC, 60 * SEC, 60 * SEC + 3).unwrap();
        assert_eq!(r, Rearm { due_us: 120 * SEC, skipped: 0 });
    }

    #[test]
    fn aligned_rearm_snaps_unaligned_due() {
        // due was not on a boundary (e.g. absolute time given without
        // alignment history) → next boundary >= due + ival
        let r = rearm_aligned(37 * SEC, 60 * SEC, 40 * SEC).unwrap();
        assert_eq!(r.due_us, 120 * SEC);
    }

    #[test]
    fn aligned_rearm_late_never_returns_past_boundary() {
        // scheduler stalled for 3.5 intervals
        let r = rearm_aligned(60 * SEC, 60 * SEC, 270 * SEC).unwrap();
        assert_eq!(r.due_us, 300 * SEC);
        assert!(is_aligned(r.due_us, 60 * SEC));
        // 120, 180, 240 were missed
        assert_eq!(r.skipped, 3);
    }

    #[test]
    fn aligned_rearm_now_on_boundary_moves_past_it() {
        let r = rearm_aligned(60 * SEC, 60 * SEC, 180 * SEC).unwrap();
        assert_eq!(r.due_us, 240 * SEC);
        assert_eq!(r.skipped, 2);
    }
}
