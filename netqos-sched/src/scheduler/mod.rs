//! Event scheduler for the quality manager.
//!
//! [`EventScheduler`] keeps submitted [`Event`]s ordered by due time and, on
//! each [`dispatch_due`](EventScheduler::dispatch_due) call, fires everything
//! that is due, invoking the handlers registered for each event's kind and
//! re-arming periodic events before moving on.
//!
//! # Design decisions vs C++ implementation
//!
//! | Topic | C++ | Rust |
//! |---|---|---|
//! | Dispatch | caller loops `getNextEvent()` / `reschedNextEvent()` | one bounded [`dispatch_due`](EventScheduler::dispatch_due) pass |
//! | Ownership | raw `Event*` handed back and forth | scheduler owns events; callers hold an [`EventHandle`] |
//! | Tie order | insertion into a sorted list | `(due, handle)` key in a `BTreeSet`, deterministic |
//! | Handler faults | `Error` thrown through the main loop | collected into `Vec<ErrorResult>`, pass continues |
//! | Follow-up events | returned in `retEvents`, added after the loop | [`DispatchContext::submit`], added when the pass ends |
//! | Threads | optional, with a global mutex | [`EventScheduler`] single-threaded; [`SharedEventScheduler`] locks only around queue mutation |
//!
//! # Concurrency
//! `EventScheduler` takes `&mut self` everywhere: it is meant to be driven by
//! a single loop, and handlers reach the queue only through their
//! [`DispatchContext`].  When other threads must submit or cancel, use
//! [`SharedEventScheduler`].  In both flavours a handler that never returns
//! stalls the pass.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use netqos_sched::event::{Alignment, Event, EventKind};
//! use netqos_sched::scheduler::EventScheduler;
//! use netqos_sched::timing::Timestamp;
//!
//! let mut sched = EventScheduler::new();
//! sched.on(EventKind::TEST, |_ev, _ctx| Ok(()));
//!
//! let t0 = Timestamp::from_micros(1_000_000);
//! let ev = Event::at(EventKind::TEST, t0, Duration::ZERO, Alignment::Free).unwrap();
//! let handle = sched.submit(ev);
//!
//! assert!(sched.dispatch_due(t0).is_empty());
//! assert!(sched.cancel(handle).is_err()); // already retired
//! ```

mod dispatch;
pub mod error;
pub mod handler;
pub mod queue;
pub mod shared;

pub use error::SchedulerError;
pub use handler::{DispatchContext, EventHandler, HandlerRegistry};
pub use queue::{EventHandle, EventQueue, EventState};
pub use shared::SharedEventScheduler;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::error::ErrorResult;
use crate::event::{Event, EventDisplay, EventKind, EventNames};
use crate::timing::Timestamp;

use dispatch::run_pass;
use handler::{FnHandler, QueueAccess};

// ── Options ───────────────────────────────────────────────────────────────────

/// Policy knobs for the dispatch pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Stop the pass after the first event whose handlers failed.  That event
    /// is still completed (retired or re-armed); the remaining due events
    /// wait for the next pass.
    pub halt_on_error: bool,
}

// ── EventScheduler ────────────────────────────────────────────────────────────

pub struct EventScheduler {
    queue: EventQueue,
    handlers: HandlerRegistry,
    names: EventNames,
    options: SchedulerOptions,
}

impl EventScheduler {
    /// Best-effort dispatch, built-in event names.
    pub fn new() -> Self {
        Self::with_options(SchedulerOptions::default(), EventNames::builtin())
    }

    pub fn with_options(options: SchedulerOptions, names: EventNames) -> Self {
        Self {
            queue: EventQueue::new(),
            handlers: HandlerRegistry::new(),
            names,
            options,
        }
    }

    // ── Registration ──────────────────────────────────────────────────────────

    /// Add `handler` for `kind`.  Handlers of one kind run in registration
    /// order.
    pub fn register_handler(&mut self, kind: EventKind, handler: Arc<dyn EventHandler>) {
        info!(
            kind = %kind,
            name = %self.names.name_of(kind),
            position = self.handlers.handler_count(kind),
            "registered event handler"
        );
        self.handlers.register(kind, handler);
    }

    /// Register a closure as a handler for `kind`.
    pub fn on<F>(&mut self, kind: EventKind, f: F)
    where
        F: Fn(&Event, &mut DispatchContext<'_>) -> Result<(), ErrorResult> + Send + Sync + 'static,
    {
        self.register_handler(kind, Arc::new(FnHandler(f)));
    }

    // ── Submission / cancellation ─────────────────────────────────────────────

    pub fn submit(&mut self, event: Event) -> EventHandle {
        let handle = self.queue.submit(event);
        tracing::debug!(handle = %handle, "event submitted");
        handle
    }

    /// # Errors
    /// [`SchedulerError::NotFound`] for unknown, cancelled or retired handles.
    pub fn cancel(&mut self, handle: EventHandle) -> Result<(), SchedulerError> {
        self.queue.cancel(handle)
    }

    /// Cancel every event tagged with `owner`; returns how many.
    pub fn cancel_owned_by(&mut self, owner: u64) -> usize {
        let n = self.queue.cancel_owned_by(owner);
        if n > 0 {
            info!(owner, cancelled = n, "cancelled events by owner");
        }
        n
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    /// Fire every event due at `now`.
    ///
    /// Returns one [`ErrorResult`] per failed handler invocation (plus one per
    /// event that could not be re-armed).  An empty vector means every
    /// handler succeeded.
    pub fn dispatch_due(&mut self, now: Timestamp) -> Vec<ErrorResult> {
        let handlers = &self.handlers;
        run_pass(
            QueueAccess::Local(&mut self.queue),
            |kind| handlers.get(kind).to_vec(),
            &self.names,
            &self.options,
            now,
        )
    }

    // ── Inspection ────────────────────────────────────────────────────────────

    pub fn next_due(&self) -> Option<Timestamp> {
        self.queue.next_due()
    }

    /// How long the driving loop may sleep: `None` with nothing pending,
    /// `Duration::ZERO` when something is already due.
    pub fn time_until_next(&self, now: Timestamp) -> Option<Duration> {
        self.next_due().map(|due| due.saturating_sub(now))
    }

    pub fn get(&self, handle: EventHandle) -> Option<&Event> {
        self.queue.get(handle)
    }

    pub fn state(&self, handle: EventHandle) -> Option<EventState> {
        self.queue.state(handle)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn names(&self) -> &EventNames {
        &self.names
    }

    pub fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    /// Render `event` with this scheduler's name table.
    pub fn describe<'a>(&'a self, event: &'a Event) -> EventDisplay<'a> {
        event.display(&self.names)
    }

    /// Log every pending event at `info`, in dispatch order.
    pub fn dump(&self) {
        info!(pending = self.queue.len(), "event scheduler contents");
        for kind in self.handlers.kinds() {
            info!(
                "  handlers for {}: {}",
                self.names.name_of(kind),
                self.handlers.handler_count(kind)
            );
        }
        for (handle, event) in self.queue.iter_pending() {
            info!("  {handle}  {}", self.describe(event));
        }
    }

    /// Tear down: cancel everything and return the pending events.
    pub fn drain(&mut self) -> Vec<Event> {
        let drained = self.queue.drain();
        info!(cancelled = drained.len(), "event scheduler drained");
        drained
    }
}

impl Default for EventScheduler {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
