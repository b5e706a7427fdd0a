//! Async loop that drives a scheduler from the wall clock.
//!
//! Each iteration runs one dispatch pass, then sleeps until the next due time
//! (never longer than the poll interval) or until shutdown is signalled on
//! the `watch` channel.  With a [`SharedEventScheduler`], events submitted
//! through other clones are therefore picked up at most one poll interval
//! late.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::ErrorResult;
use crate::scheduler::{EventScheduler, SharedEventScheduler};
use crate::timing::{Clock, Timestamp};

// ── DispatchTarget ────────────────────────────────────────────────────────────

/// What the driver needs from a scheduler.
pub trait DispatchTarget {
    fn dispatch_due(&mut self, now: Timestamp) -> Vec<ErrorResult>;
    fn time_until_next(&self, now: Timestamp) -> Option<Duration>;
    fn len(&self) -> usize;
}

impl DispatchTarget for EventScheduler {
    fn dispatch_due(&mut self, now: Timestamp) -> Vec<ErrorResult> {
        EventScheduler::dispatch_due(self, now)
    }

    fn time_until_next(&self, now: Timestamp) -> Option<Duration> {
        EventScheduler::time_until_next(self, now)
    }

    fn len(&self) -> usize {
        EventScheduler::len(self)
    }
}

impl DispatchTarget for SharedEventScheduler {
    fn dispatch_due(&mut self, now: Timestamp) -> Vec<ErrorResult> {
        SharedEventScheduler::dispatch_due(self, now)
    }

    fn time_until_next(&self, now: Timestamp) -> Option<Duration> {
        SharedEventScheduler::time_until_next(self, now)
    }

    fn len(&self) -> usize {
        SharedEventScheduler::len(self)
    }
}

// ── Driver loop ───────────────────────────────────────────────────────────────

/// Counters reported when the loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    pub passes: u64,
    pub failures: u64,
}

/// Run dispatch passes until `shutdown` becomes `true` or its sender is
/// dropped.
pub async fn run<S, C>(
    scheduler: &mut S,
    clock: &C,
    poll_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> DriverStats
where
    S: DispatchTarget + ?Sized,
    C: Clock + ?Sized,
{
    let mut stats = DriverStats::default();
    info!(poll = ?poll_interval, "event driver started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let now = clock.now();
        let failures = scheduler.dispatch_due(now);
        stats.passes += 1;
        if !failures.is_empty() {
            stats.failures += failures.len() as u64;
            for err in &failures {
                warn!(code = err.code(), error = %err, "dispatch pass reported failure");
            }
        }

        let wait = scheduler
            .time_until_next(clock.now())
            .map_or(poll_interval, |d| d.min(poll_interval));
        debug!(wait = ?wait, pending = scheduler.len(), "driver sleeping");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    debug!("shutdown sender dropped");
                    break;
                }
            }
        }
    }

    info!(
        passes = stats.passes,
        failures = stats.failures,
        "event driver stopped"
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorResult;
    use crate::event::{Alignment, Event, EventKind};
    use crate::timing::{ManualClock, SystemClock, Timestamp};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn already_shut_down_runs_no_pass() {
        let (_tx, rx) = watch::channel(true);
        let mut sched = EventScheduler::new();
        let stats = run(&mut sched, &SystemClock, Duration::from_millis(10), rx).await;
        assert_eq!(stats.passes, 0);
    }

    #[tokio::test]
    async fn fires_wall_clock_timer_then_stops() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut sched = EventScheduler::new();
        {
            let fired = Arc::clone(&fired);
            sched.on(EventKind::TIMER_EXPIRED, move |_ev, _ctx| {
                fired.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        let ev = Event::after(
            EventKind::TIMER_EXPIRED,
            0,
            20_000,
            Duration::ZERO,
            Alignment::Free,
            &SystemClock,
        )
        .unwrap();
        sched.submit(ev);

        let (tx, rx) = watch::channel(false);
        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            tx.send(true).unwrap();
        });

        let stats = run(&mut sched, &SystemClock, Duration::from_millis(50), rx).await;
        stopper.await.unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(stats.passes >= 2);
        assert!(sched.is_empty());
    }

    #[tokio::test]
    async fn drives_shared_scheduler_while_another_task_submits() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut sched = SharedEventScheduler::new();
        {
            let fired = Arc::clone(&fired);
            sched.on(EventKind::ADD_RULES, move |_ev, _ctx| {
                fired.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        let (tx, rx) = watch::channel(false);
        let submitter = {
            let sched = sched.clone();
            tokio::spawn(async move {
                // the driver is already idling on an empty queue by now
                tokio::time::sleep(Duration::from_millis(30)).await;
                let ev = Event::after(
                    EventKind::ADD_RULES,
                    0,
                    0,
                    Duration::ZERO,
                    Alignment::Free,
                    &SystemClock,
                )
                .unwrap();
                sched.submit(ev);
                tokio::time::sleep(Duration::from_millis(150)).await;
                tx.send(true).unwrap();
            })
        };

        let stats = run(&mut sched, &SystemClock, Duration::from_millis(20), rx).await;
        submitter.await.unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(stats.passes >= 2);
        assert!(sched.is_empty());
    }

    #[tokio::test]
    async fn failures_are_counted() {
        let clock = ManualClock::new(Timestamp::from_micros(5_000_000));
        let mut sched = EventScheduler::new();
        sched.on(EventKind::WATCHDOG_CHECK, |_ev, _ctx| {
            Err(ErrorResult::new(13, "process missing"))
        });
        sched.submit(
            Event::at(
                EventKind::WATCHDOG_CHECK,
                Timestamp::from_micros(1_000_000),
                Duration::ZERO,
                Alignment::Free,
            )
            .unwrap(),
        );

        let (tx, rx) = watch::channel(false);
        drop(tx);
        let stats = run(&mut sched, &clock, Duration::from_millis(10), rx).await;

        assert_eq!(stats.passes, 1);
        assert_eq!(stats.failures, 1);
    }
}
