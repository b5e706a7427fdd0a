//! The dispatch pass shared by both scheduler flavours.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::ErrorResult;
use crate::event::{Event, EventKind, EventNames};
use crate::timing::Timestamp;

use super::handler::{DispatchContext, EventHandler, QueueAccess};
use super::queue::{Completion, EventHandle};
use super::SchedulerOptions;

/// Run one bounded pass over everything due at `now`.
///
/// `handlers_for` is called once per popped event, with no queue lock held,
/// and the handlers it returns are invoked with no queue lock held either.
pub(crate) fn run_pass<F>(
    mut queue: QueueAccess<'_>,
    handlers_for: F,
    names: &EventNames,
    options: &SchedulerOptions,
    now: Timestamp,
) -> Vec<ErrorResult>
where
    F: Fn(EventKind) -> Vec<Arc<dyn EventHandler>>,
{
    let mut failures = Vec::new();
    let mut staged: Vec<EventHandle> = Vec::new();
    let mut dispatched = 0usize;

    while let Some((handle, event)) = queue.with(|q| q.pop_due(now)) {
        dispatched += 1;
        debug!(
            handle = %handle,
            event = %event.display(names),
            "dispatching"
        );

        let handlers = handlers_for(event.kind());
        let errors = {
            let mut ctx = DispatchContext::new(queue.reborrow(), &mut staged, now, handle);
            invoke_handlers(&handlers, &event, &mut ctx, names)
        };
        let failed = !errors.is_empty();
        failures.extend(errors);

        match queue.with(|q| q.complete(handle, now)) {
            Ok(Completion::Retired) => {}
            Ok(Completion::Cancelled) => {
                debug!(handle = %handle, "cancelled during dispatch, not re-armed");
            }
            Ok(Completion::Rearmed(rearm)) => {
                if rearm.skipped > 0 {
                    debug!(
                        handle = %handle,
                        skipped = rearm.skipped,
                        next_due_us = rearm.due_us,
                        "dispatch was late, missed occurrences skipped"
                    );
                }
            }
            Err(e) => {
                warn!(handle = %handle, error = %e, "could not re-arm event, retired");
                failures.push(e.into());
            }
        }

        if failed && options.halt_on_error {
            info!(
                handle = %handle,
                "halting dispatch pass after handler failure"
            );
            break;
        }
    }

    if !staged.is_empty() {
        let released = queue.with(|q| q.release_staged(&staged));
        debug!(
            submitted = staged.len(),
            released,
            "adding events submitted during dispatch"
        );
    }

    if dispatched > 0 {
        debug!(
            dispatched,
            failures = failures.len(),
            now = %now,
            "dispatch pass done"
        );
    }

    failures
}

/// Call every handler in registration order and collect their failures.
fn invoke_handlers(
    handlers: &[Arc<dyn EventHandler>],
    event: &Event,
    ctx: &mut DispatchContext<'_>,
    names: &EventNames,
) -> Vec<ErrorResult> {
    if handlers.is_empty() {
        warn!(
            kind = %event.kind(),
            name = %names.name_of(event.kind()),
            "no handler registered for event kind"
        );
        return Vec::new();
    }

    let mut errors = Vec::new();
    for (idx, handler) in handlers.iter().enumerate() {
        match handler.handle(event, ctx) {
            Ok(()) => {}
            // An Err carrying code 0 is a success in disguise
            Err(err) if err.is_success() => {}
            Err(err) => {
                warn!(
                    kind = %event.kind(),
                    handler = idx,
                    code = err.code(),
                    error = %err,
                    "event handler failed"
                );
                errors.push(err);
            }
        }
    }
    errors
}
