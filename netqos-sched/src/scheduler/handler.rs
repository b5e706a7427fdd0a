//! Collaborator callbacks and what they may do while running.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::ErrorResult;
use crate::event::{Event, EventKind};
use crate::timing::Timestamp;

use super::error::SchedulerError;
use super::queue::{EventHandle, EventQueue};

// ── EventHandler ──────────────────────────────────────────────────────────────

/// Callback invoked for every dispatched event of the kind it is registered
/// for.
///
/// Returning `Err` records the failure in the dispatch pass result; it never
/// stops other handlers of the same event.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &Event, ctx: &mut DispatchContext<'_>) -> Result<(), ErrorResult>;
}

/// Adapter so plain closures can be registered.
pub(crate) struct FnHandler<F>(pub(crate) F);

impl<F> EventHandler for FnHandler<F>
where
    F: Fn(&Event, &mut DispatchContext<'_>) -> Result<(), ErrorResult> + Send + Sync,
{
    fn handle(&self, event: &Event, ctx: &mut DispatchContext<'_>) -> Result<(), ErrorResult> {
        (self.0)(event, ctx)
    }
}

// ── HandlerRegistry ───────────────────────────────────────────────────────────

/// Kind → handlers, in registration order.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<EventKind, Vec<Arc<dyn EventHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: EventKind, handler: Arc<dyn EventHandler>) {
        self.handlers.entry(kind).or_default().push(handler);
    }

    /// Handlers for `kind`; empty if none are registered.
    pub fn get(&self, kind: EventKind) -> &[Arc<dyn EventHandler>] {
        self.handlers.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.get(kind).len()
    }

    pub fn kinds(&self) -> impl Iterator<Item = EventKind> + '_ {
        self.handlers.keys().copied()
    }
}

// ── Queue access ──────────────────────────────────────────────────────────────

/// The pending set as seen from a dispatch pass: borrowed exclusively in the
/// single-threaded scheduler, behind a mutex in the shared one.
pub(crate) enum QueueAccess<'a> {
    Local(&'a mut EventQueue),
    Shared(&'a Mutex<EventQueue>),
}

impl QueueAccess<'_> {
    /// Run `f` with the queue; for the shared queue the lock is held only for
    /// the duration of `f`.
    pub(crate) fn with<R>(&mut self, f: impl FnOnce(&mut EventQueue) -> R) -> R {
        match self {
            QueueAccess::Local(q) => f(q),
            QueueAccess::Shared(m) => f(&mut lock_queue(m)),
        }
    }

    pub(crate) fn reborrow(&mut self) -> QueueAccess<'_> {
        match self {
            QueueAccess::Local(q) => QueueAccess::Local(&mut **q),
            QueueAccess::Shared(m) => QueueAccess::Shared(*m),
        }
    }
}

/// Lock the shared queue.  Handlers never run under this lock, so a poisoned
/// mutex only means a panic inside queue bookkeeping; the data is still
/// consistent enough to keep going.
pub(crate) fn lock_queue(m: &Mutex<EventQueue>) -> MutexGuard<'_, EventQueue> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── DispatchContext ───────────────────────────────────────────────────────────

/// Handed to every handler invocation.
///
/// Events submitted here are live at once ([`EventState::Staged`]): any
/// thread can look them up or cancel them.  They only become dispatchable
/// when the current pass ends, so a handler that keeps re-submitting "now"
/// events cannot make a pass run forever.  Cancellation takes effect
/// immediately.
///
/// [`EventState::Staged`]: super::queue::EventState::Staged
pub struct DispatchContext<'a> {
    queue: QueueAccess<'a>,
    staged: &'a mut Vec<EventHandle>,
    now: Timestamp,
    current: EventHandle,
}

impl<'a> DispatchContext<'a> {
    pub(crate) fn new(
        queue: QueueAccess<'a>,
        staged: &'a mut Vec<EventHandle>,
        now: Timestamp,
        current: EventHandle,
    ) -> Self {
        Self {
            queue,
            staged,
            now,
            current,
        }
    }

    /// Reference time of the running pass.
    pub fn now(&self) -> Timestamp {
        self.now
    }

    /// Handle of the event being dispatched.
    pub fn current(&self) -> EventHandle {
        self.current
    }

    /// Submit a follow-up event.  It becomes pending after this pass.
    pub fn submit(&mut self, event: Event) -> EventHandle {
        let handle = self.queue.with(|q| q.stage(event));
        self.staged.push(handle);
        handle
    }

    /// Cancel a pending event, an event staged earlier in this pass, or the
    /// event currently being dispatched (which then is not re-armed).
    pub fn cancel(&mut self, handle: EventHandle) -> Result<(), SchedulerError> {
        self.queue.with(|q| q.cancel(handle))
    }

    /// Cancel all live events tagged with `owner`, staged ones included.
    pub fn cancel_owned_by(&mut self, owner: u64) -> usize {
        self.queue.with(|q| q.cancel_owned_by(owner))
    }
}
