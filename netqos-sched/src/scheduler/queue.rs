//! The time-ordered pending set.
//!
//! [`EventQueue`] owns the scheduling state of every live event.  It knows
//! nothing about handlers: the dispatch pass pops an event, runs handlers
//! elsewhere, then reports back through [`EventQueue::complete`].
//!
//! Ordering key is `(due, handle)`.  Handles are allocated from a
//! monotonically increasing counter at submission, so for equal due times the
//! first-submitted event is dispatched first.  `BTreeSet` (not a heap) keeps
//! iteration deterministic and makes removal by key `O(log n)`.
//!
//! ```text
//!   stage (from a handler)
//!   ───────► Staged ──► flushed when the pass ends
//!                            │
//!            submit          ▼     pop_due               complete
//!   ─────────────────► Pending ─────────────► Dispatching ─────────┬──► retired (one-shot)
//!                        │  ▲                      │                │
//!                 cancel │  └──────────────────────┼── re-armed ◄───┘   (periodic)
//!                        ▼                         │ cancel
//!                    cancelled                     ▼
//!                                       cancel_requested → retired on complete
//! ```

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use tracing::debug;

use crate::event::Event;
use crate::timing::align::Rearm;
use crate::timing::Timestamp;

use super::error::SchedulerError;

// ── Handle ────────────────────────────────────────────────────────────────────

/// Opaque reference to a submitted event, used for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventHandle(u64);

impl EventHandle {
    pub(crate) fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ── State ─────────────────────────────────────────────────────────────────────

/// Observable state of a live event.
///
/// Retired and cancelled events are no longer live: their handles resolve to
/// nothing.  A `Pending` event whose due time has passed is "due" and will be
/// picked up by the next dispatch pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventState {
    /// Submitted by a handler during the running pass.  Visible and
    /// cancellable, but only eligible for dispatch once the pass ends.
    Staged,
    Pending,
    Dispatching,
}

/// What happened to an event after its handlers ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// One-shot event, now gone.
    Retired,
    /// Cancelled while its handlers were running; not re-armed.
    Cancelled,
    /// Periodic event put back into the pending set.
    Rearmed(Rearm),
}

struct Entry {
    event: Event,
    state: EventState,
    cancel_requested: bool,
}

// ── EventQueue ────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct EventQueue {
    /// Pending events only, ordered by `(due, handle)`.
    order: BTreeSet<(Timestamp, EventHandle)>,
    /// Every live event, pending or in flight.
    entries: HashMap<EventHandle, Entry>,
    next_handle: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a handle without inserting anything yet.
    fn reserve_handle(&mut self) -> EventHandle {
        let handle = EventHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    /// Insert `event` into the pending set and return its handle.
    ///
    /// An event whose due time has already passed is due on the next pass.
    pub fn submit(&mut self, event: Event) -> EventHandle {
        let handle = self.reserve_handle();
        self.insert(handle, event);
        handle
    }

    fn insert(&mut self, handle: EventHandle, event: Event) {
        self.order.insert((event.due(), handle));
        self.entries.insert(
            handle,
            Entry {
                event,
                state: EventState::Pending,
                cancel_requested: false,
            },
        );
    }

    /// Register an event submitted during a dispatch pass.  It is live
    /// (lookups and cancellation see it) but stays out of the dispatch order
    /// until [`release_staged`](Self::release_staged).
    pub(crate) fn stage(&mut self, event: Event) -> EventHandle {
        let handle = self.reserve_handle();
        self.entries.insert(
            handle,
            Entry {
                event,
                state: EventState::Staged,
                cancel_requested: false,
            },
        );
        handle
    }

    /// Make staged events dispatchable.  Handles cancelled or drained in the
    /// meantime are skipped.  Returns how many were released.
    pub(crate) fn release_staged(&mut self, handles: &[EventHandle]) -> usize {
        let mut released = 0;
        for &handle in handles {
            let Some(entry) = self.entries.get_mut(&handle) else {
                continue;
            };
            if entry.state != EventState::Staged {
                continue;
            }
            entry.state = EventState::Pending;
            self.order.insert((entry.event.due(), handle));
            released += 1;
        }
        released
    }

    /// Remove a pending event.
    ///
    /// For an event currently being dispatched this succeeds without
    /// interrupting its handlers; the event is simply not re-armed.
    ///
    /// # Errors
    /// [`SchedulerError::NotFound`] if the handle is not live.
    pub fn cancel(&mut self, handle: EventHandle) -> Result<(), SchedulerError> {
        let entry = self
            .entries
            .get_mut(&handle)
            .ok_or(SchedulerError::NotFound { handle })?;

        match entry.state {
            EventState::Pending => {
                self.order.remove(&(entry.event.due(), handle));
                self.entries.remove(&handle);
                debug!(handle = %handle, "event cancelled");
            }
            EventState::Staged => {
                self.entries.remove(&handle);
                debug!(handle = %handle, "staged event cancelled");
            }
            EventState::Dispatching => {
                entry.cancel_requested = true;
                debug!(handle = %handle, "cancel requested for in-flight event");
            }
        }
        Ok(())
    }

    /// Cancel every live event tagged with `owner`.  Returns how many were
    /// affected (pending and staged removed, plus in-flight newly marked).
    pub fn cancel_owned_by(&mut self, owner: u64) -> usize {
        let handles: Vec<EventHandle> = self
            .entries
            .iter()
            .filter(|(_, e)| e.event.owner() == Some(owner) && !e.cancel_requested)
            .map(|(h, _)| *h)
            .collect();

        handles
            .into_iter()
            .filter(|h| self.cancel(*h).is_ok())
            .count()
    }

    /// Take the earliest pending event if it is due at `now`.
    ///
    /// The event stays live in the `Dispatching` state until
    /// [`complete`](Self::complete) is called for it.
    pub(crate) fn pop_due(&mut self, now: Timestamp) -> Option<(EventHandle, Event)> {
        let &(due, handle) = self.order.first()?;
        if due > now {
            return None;
        }
        self.order.pop_first();
        let entry = self.entries.get_mut(&handle)?;
        entry.state = EventState::Dispatching;
        Some((handle, entry.event.clone()))
    }

    /// Finish the dispatch of `handle` at `now`: retire it, or re-arm it if
    /// periodic and not cancelled in flight.
    ///
    /// # Errors
    /// * [`SchedulerError::NotFound`] if `handle` is not in flight.
    /// * [`SchedulerError::TimeOverflow`] if the next occurrence is beyond
    ///   the timestamp range; the event is retired.
    pub(crate) fn complete(
        &mut self,
        handle: EventHandle,
        now: Timestamp,
    ) -> Result<Completion, SchedulerError> {
        let entry = match self.entries.get_mut(&handle) {
            Some(e) if e.state == EventState::Dispatching => e,
            _ => return Err(SchedulerError::NotFound { handle }),
        };

        if entry.cancel_requested {
            self.entries.remove(&handle);
            return Ok(Completion::Cancelled);
        }

        match entry.event.next_occurrence(now) {
            Ok(Some(rearm)) => {
                let due = Timestamp::from_micros(rearm.due_us);
                entry.event.set_due(due);
                entry.state = EventState::Pending;
                self.order.insert((due, handle));
                Ok(Completion::Rearmed(rearm))
            }
            Ok(None) => {
                self.entries.remove(&handle);
                Ok(Completion::Retired)
            }
            Err(e) => {
                self.entries.remove(&handle);
                Err(e)
            }
        }
    }

    /// Due time of the earliest pending event.
    pub fn next_due(&self) -> Option<Timestamp> {
        self.order.first().map(|(due, _)| *due)
    }

    pub fn get(&self, handle: EventHandle) -> Option<&Event> {
        self.entries.get(&handle).map(|e| &e.event)
    }

    pub fn state(&self, handle: EventHandle) -> Option<EventState> {
        self.entries.get(&handle).map(|e| e.state)
    }

    /// Number of live events (pending and in flight).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pending events in dispatch order.
    pub fn iter_pending(&self) -> impl Iterator<Item = (EventHandle, &Event)> {
        self.order
            .iter()
            .filter_map(|(_, h)| self.entries.get(h).map(|e| (*h, &e.event)))
    }

    /// Cancel everything.  Pending events are returned in dispatch order,
    /// followed by staged ones in submission order; in-flight events are
    /// marked so they are not re-armed.
    pub fn drain(&mut self) -> Vec<Event> {
        let order = std::mem::take(&mut self.order);
        let mut drained: Vec<Event> = order
            .into_iter()
            .filter_map(|(_, h)| self.entries.remove(&h).map(|e| e.event))
            .collect();

        let mut staged: Vec<EventHandle> = self
            .entries
            .iter()
            .filter(|(_, e)| e.state == EventState::Staged)
            .map(|(h, _)| *h)
            .collect();
        staged.sort();
        drained.extend(
            staged
                .into_iter()
                .filter_map(|h| self.entries.remove(&h).map(|e| e.event)),
        );

        for entry in self.entries.values_mut() {
            entry.cancel_requested = true;
        }
        drained
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
