/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error type for the event scheduler.
//!
//! [`SchedulerError`] covers the two failure classes the scheduler detects
//! itself:
//!
//! * **construction**: an [`Event`](crate::event::Event) whose interval and
//!   alignment do not make sense, or whose times leave the timestamp range;
//! * **lookup**: `cancel` on a handle that is unknown or already retired.
//!
//! Handler failures are not represented here: they come back verbatim as
//! [`ErrorResult`]s from the dispatch pass.
//!
//! Every variant maps to an errno-style code so it can be handed to a
//! collaborator as an `ErrorResult`:
//!
//! | Variant | Code |
//! |---|---|
//! | `AlignmentWithoutInterval` | `EINVAL` |
//! | `IntervalBelowResolution` | `EINVAL` |
//! | `TimeOverflow` | `ERANGE` |
//! | `NotFound` | `ENOENT` |

use thiserror::Error;

use crate::error::{codes, ErrorResult};
use crate::scheduler::queue::EventHandle;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// Alignment was requested for an event with a zero interval.
    #[error("alignment requested for a one-shot event (interval is zero)")]
    AlignmentWithoutInterval,

    /// A non-zero interval shorter than the 1 µs clock resolution.
    #[error("interval of {interval_ns}ns is below the 1µs clock resolution")]
    IntervalBelowResolution { interval_ns: u128 },

    /// Due-time or interval arithmetic overflowed the timestamp range.
    #[error("time arithmetic overflowed the timestamp range")]
    TimeOverflow,

    /// The handle is unknown, cancelled, or belongs to a retired one-shot.
    #[error("no live event with handle {handle}")]
    NotFound { handle: EventHandle },
}

impl SchedulerError {
    /// errno-style code for this error.
    pub fn code(&self) -> i32 {
        match self {
            SchedulerError::AlignmentWithoutInterval
            | SchedulerError::IntervalBelowResolution { .. } => codes::EINVAL,
            SchedulerError::TimeOverflow => codes::ERANGE,
            SchedulerError::NotFound { .. } => codes::ENOENT,
        }
    }
}

impl From<SchedulerError> for ErrorResult {
    fn from(err: SchedulerError) -> Self {
        ErrorResult::new(err.code(), err.to_string())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
