//! Thread-safe scheduler handle.
//!
//! [`SharedEventScheduler`] is a cheap `Clone` around one scheduler: any
//! thread may submit, cancel or register handlers while another drives the
//! dispatch loop.  The queue mutex is held only for bookkeeping, never while
//! a handler runs, so handlers may call back into the same scheduler through
//! a clone.  Passes are serialised; calling
//! [`dispatch_due`](SharedEventScheduler::dispatch_due) from inside a handler
//! deadlocks.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::ErrorResult;
use crate::event::{Event, EventKind, EventNames};
use crate::timing::Timestamp;

use super::dispatch::run_pass;
use super::handler::{lock_queue, DispatchContext, EventHandler, FnHandler, HandlerRegistry, QueueAccess};
use super::queue::{EventHandle, EventQueue, EventState};
use super::{SchedulerError, SchedulerOptions};

struct Inner {
    queue: Mutex<EventQueue>,
    handlers: RwLock<HandlerRegistry>,
    pass: Mutex<()>,
    names: EventNames,
    options: SchedulerOptions,
}

#[derive(Clone)]
pub struct SharedEventScheduler {
    inner: Arc<Inner>,
}

impl SharedEventScheduler {
    pub fn new() -> Self {
        Self::with_options(SchedulerOptions::default(), EventNames::builtin())
    }

    pub fn with_options(options: SchedulerOptions, names: EventNames) -> Self {
        Self {
            inner: Arc::new(Inner {
                queue: Mutex::new(EventQueue::new()),
                handlers: RwLock::new(HandlerRegistry::new()),
                pass: Mutex::new(()),
                names,
                options,
            }),
        }
    }

    pub fn register_handler(&self, kind: EventKind, handler: Arc<dyn EventHandler>) {
        let mut handlers = self
            .inner
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        info!(
            kind = %kind,
            name = %self.inner.names.name_of(kind),
            position = handlers.handler_count(kind),
            "registered event handler"
        );
        handlers.register(kind, handler);
    }

    pub fn on<F>(&self, kind: EventKind, f: F)
    where
        F: Fn(&Event, &mut DispatchContext<'_>) -> Result<(), ErrorResult> + Send + Sync + 'static,
    {
        self.register_handler(kind, Arc::new(FnHandler(f)));
    }

    pub fn submit(&self, event: Event) -> EventHandle {
        let handle = self.queue().submit(event);
        debug!(handle = %handle, "event submitted");
        handle
    }

    /// Same contract as [`EventScheduler::cancel`](super::EventScheduler::cancel);
    /// an in-flight event cancelled from another thread finishes its current
    /// dispatch and is not re-armed.
    pub fn cancel(&self, handle: EventHandle) -> Result<(), SchedulerError> {
        self.queue().cancel(handle)
    }

    pub fn cancel_owned_by(&self, owner: u64) -> usize {
        self.queue().cancel_owned_by(owner)
    }

    pub fn dispatch_due(&self, now: Timestamp) -> Vec<ErrorResult> {
        let _pass = self
            .inner
            .pass
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let registry = &self.inner.handlers;
        run_pass(
            QueueAccess::Shared(&self.inner.queue),
            |kind| {
                registry
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get(kind)
                    .to_vec()
            },
            &self.inner.names,
            &self.inner.options,
            now,
        )
    }

    pub fn next_due(&self) -> Option<Timestamp> {
        self.queue().next_due()
    }

    pub fn time_until_next(&self, now: Timestamp) -> Option<Duration> {
        self.next_due().map(|due| due.saturating_sub(now))
    }

    /// Snapshot of a live event.
    pub fn get(&self, handle: EventHandle) -> Option<Event> {
        self.queue().get(handle).cloned()
    }

    pub fn state(&self, handle: EventHandle) -> Option<EventState> {
        self.queue().state(handle)
    }

    pub fn len(&self) -> usize {
        self.queue().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue().is_empty()
    }

    pub fn names(&self) -> &EventNames {
        &self.inner.names
    }

    pub fn drain(&self) -> Vec<Event> {
        let drained = self.queue().drain();
        info!(cancelled = drained.len(), "event scheduler drained");
        drained
    }

    fn queue(&self) -> std::sync::MutexGuard<'_, EventQueue> {
        lock_queue(&self.inner.queue)
    }
}

impl Default for SharedEventScheduler {
    fn default() -> Self {
        Self::new()
    }
}
