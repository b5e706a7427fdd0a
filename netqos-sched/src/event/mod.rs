/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Schedulable events.
//!
//! An [`Event`] is a value: a kind, a concrete due time, an optional repeat
//! interval and an alignment directive.  Every constructor resolves the due
//! time immediately, so an event is never "eventually" due.
//!
//! # Construction modes
//!
//! | Constructor | Due time |
//! |---|---|
//! | [`Event::at`] | the given absolute time |
//! | [`Event::after`] | clock reading **at construction** + offset |
//! | [`Event::every`] | one interval from now (free) / next boundary (aligned) |
//!
//! With [`Alignment::Boundary`] the resolved due time is then moved to the
//! first interval boundary strictly after it.  Boundaries are multiples of the
//! interval from the Unix epoch (see [`crate::timing`]).
//!
//! # Design decisions vs C++ implementation
//!
//! | Topic | C++ | Rust |
//! |---|---|---|
//! | Kinds | one subclass per `event_t` | [`EventKind`] tag, payload stays with the collaborator |
//! | Interval unit | `unsigned long` ms | `Duration`, stored as µs |
//! | Align flag | `int align` | [`Alignment`] enum |
//! | Invalid combos | accepted silently (`align` on a one-shot is a no-op) | rejected with [`SchedulerError`] |
//! | Owning rule | `deleteRule(uid)` virtual per subclass | optional `owner` tag + `cancel_owned_by` |

pub mod kind;

pub use kind::{EventKind, EventNames};

use std::fmt;
use std::time::Duration;

use crate::scheduler::SchedulerError;
use crate::timing::align::{self, Rearm};
use crate::timing::{duration_to_micros, Clock, Timestamp};

// ── Alignment ─────────────────────────────────────────────────────────────────

/// How a periodic event's fire times relate to the wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    /// Fire times drift from the first due time.
    #[default]
    Free,
    /// Fire times snap to multiples of the interval from the epoch.
    Boundary,
}

impl Alignment {
    pub fn from_flag(aligned: bool) -> Self {
        if aligned {
            Alignment::Boundary
        } else {
            Alignment::Free
        }
    }
}

// ── Event ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    kind: EventKind,
    due: Timestamp,
    /// Repeat interval in µs; `0` = one-shot.
    interval_us: u64,
    alignment: Alignment,
    owner: Option<u64>,
}

impl Event {
    /// Event due at the absolute time `due`.
    ///
    /// # Errors
    /// * [`SchedulerError::AlignmentWithoutInterval`] – `Boundary` with a
    ///   zero interval.
    /// * [`SchedulerError::IntervalBelowResolution`] – non-zero interval
    ///   shorter than 1 µs.
    /// * [`SchedulerError::TimeOverflow`] – interval or aligned due time
    ///   beyond the timestamp range.
    pub fn at(
        kind: EventKind,
        due: Timestamp,
        interval: Duration,
        alignment: Alignment,
    ) -> Result<Self, SchedulerError> {
        let interval_us = validate_interval(interval, alignment)?;

        let due = match alignment {
            Alignment::Free => due,
            Alignment::Boundary => align::next_boundary_after(due.as_micros(), interval_us)
                .map(Timestamp::from_micros)
                .ok_or(SchedulerError::TimeOverflow)?,
        };

        Ok(Self {
            kind,
            due,
            interval_us,
            alignment,
            owner: None,
        })
    }

    /// Event due `offset_secs` s + `offset_usecs` µs after the clock reading
    /// taken **now**, not at submission.
    pub fn after<C: Clock + ?Sized>(
        kind: EventKind,
        offset_secs: u64,
        offset_usecs: u64,
        interval: Duration,
        alignment: Alignment,
        clock: &C,
    ) -> Result<Self, SchedulerError> {
        let offset = Duration::from_secs(offset_secs)
            .checked_add(Duration::from_micros(offset_usecs))
            .ok_or(SchedulerError::TimeOverflow)?;
        let due = clock
            .now()
            .checked_add(offset)
            .ok_or(SchedulerError::TimeOverflow)?;
        Self::at(kind, due, interval, alignment)
    }

    /// Event whose first fire is at most one interval away.
    ///
    /// * `Free` – due at `now + interval`.
    /// * `Boundary` – due at the first boundary after `now`.
    pub fn every<C: Clock + ?Sized>(
        kind: EventKind,
        interval: Duration,
        alignment: Alignment,
        clock: &C,
    ) -> Result<Self, SchedulerError> {
        let now = clock.now();
        match alignment {
            Alignment::Free => {
                validate_interval(interval, alignment)?;
                let due = now
                    .checked_add(interval)
                    .ok_or(SchedulerError::TimeOverflow)?;
                Self::at(kind, due, interval, alignment)
            }
            Alignment::Boundary => Self::at(kind, now, interval, alignment),
        }
    }

    /// Tag the event with the id of whatever created it (e.g. a rule), so
    /// all its events can be cancelled together.
    pub fn with_owner(mut self, owner: u64) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn due(&self) -> Timestamp {
        self.due
    }

    pub fn interval(&self) -> Duration {
        Duration::from_micros(self.interval_us)
    }

    pub fn interval_micros(&self) -> u64 {
        self.interval_us
    }

    pub fn alignment(&self) -> Alignment {
        self.alignment
    }

    pub fn is_periodic(&self) -> bool {
        self.interval_us > 0
    }

    pub fn owner(&self) -> Option<u64> {
        self.owner
    }

    /// Where a periodic event goes after being dispatched at `now`.
    ///
    /// Returns `Ok(None)` for one-shot events.  The returned due time is
    /// always strictly after `now`; occurrences that fell between the old due
    /// time and `now` are counted in [`Rearm::skipped`] and never replayed.
    pub fn next_occurrence(&self, now: Timestamp) -> Result<Option<Rearm>, SchedulerError> {
        if !self.is_periodic() {
            return Ok(None);
        }
        let due = self.due.as_micros();
        let now = now.as_micros();
        let rearm = match self.alignment {
            Alignment::Free => align::rearm_free(due, self.interval_us, now),
            Alignment::Boundary => align::rearm_aligned(due, self.interval_us, now),
        };
        rearm.map(Some).ok_or(SchedulerError::TimeOverflow)
    }

    pub(crate) fn set_due(&mut self, due: Timestamp) {
        self.due = due;
    }

    /// Render with a name table, e.g. `Ctrlcomm-timer event: 1700000000000000 (5000ms)`.
    pub fn display<'a>(&'a self, names: &'a EventNames) -> EventDisplay<'a> {
        EventDisplay { event: self, names }
    }
}

/// Helper returned by [`Event::display`].
pub struct EventDisplay<'a> {
    event: &'a Event,
    names: &'a EventNames,
}

impl fmt::Display for EventDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ev = self.event;
        write!(
            f,
            "{} event: {} ({}ms",
            self.names.name_of(ev.kind),
            ev.due.as_micros(),
            ev.interval_us / 1_000
        )?;
        if ev.alignment == Alignment::Boundary {
            f.write_str(", aligned")?;
        }
        f.write_str(")")
    }
}

/// Check the interval/alignment pair and return the interval in µs.
fn validate_interval(interval: Duration, alignment: Alignment) -> Result<u64, SchedulerError> {
    let interval_us = duration_to_micros(interval).ok_or(SchedulerError::TimeOverflow)?;
    if interval_us == 0 && !interval.is_zero() {
        return Err(SchedulerError::IntervalBelowResolution {
            interval_ns: interval.as_nanos(),
        });
    }
    if interval_us == 0 && alignment == Alignment::Boundary {
        return Err(SchedulerError::AlignmentWithoutInterval);
    }
    Ok(interval_us)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
