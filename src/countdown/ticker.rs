//! Polling countdown — republishes the remaining time once per tick.
//!
//! DESIGN
//! ======
//! The first value is computed before the task is spawned, so observers
//! never see a blank period. A background task then wakes every `period`,
//! recomputes, and publishes through a `watch` channel. The task exits on
//! its own after publishing an ended value.
//!
//! The task is a scoped resource: `CountdownHandle::cancel` aborts it, and
//! dropping the handle does the same, so a ticker can never outlive the
//! view that owns it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use super::{RemainingDuration, remaining};

const MIN_PERIOD: Duration = Duration::from_millis(1);

// =============================================================================
// CLOCK
// =============================================================================

/// Source of "now" for the ticker.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> OffsetDateTime;
}

/// Wall clock in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

// =============================================================================
// HANDLE
// =============================================================================

/// Owner of a running countdown.
pub struct CountdownHandle {
    rx: watch::Receiver<RemainingDuration>,
    task: Option<JoinHandle<()>>,
    cancelled: AtomicBool,
}

impl CountdownHandle {
    /// Latest published value.
    #[must_use]
    pub fn current(&self) -> RemainingDuration {
        *self.rx.borrow()
    }

    /// A new observer of the countdown.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<RemainingDuration> {
        self.rx.clone()
    }

    /// Stop ticking. Returns `true` only for the call that actually stopped
    /// the task; later calls are no-ops.
    pub fn cancel(&self) -> bool {
        if self.cancelled.swap(true, Ordering::AcqRel) {
            return false;
        }
        match &self.task {
            Some(task) if !task.is_finished() => {
                task.abort();
                debug!("countdown cancelled");
                true
            }
            _ => false,
        }
    }

    /// `true` once the ticker is no longer running (ended or cancelled).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait until an ended value is published.
    ///
    /// Returns `false` if the countdown was cancelled first.
    pub async fn wait_ended(&self) -> bool {
        let mut rx = self.rx.clone();
        rx.wait_for(|r| r.ended).await.is_ok()
    }
}

impl Drop for CountdownHandle {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}

// =============================================================================
// SPAWN
// =============================================================================

/// Start a countdown to `end`, ticking every `period` (at least 1 ms).
///
/// Must be called from within a tokio runtime unless `end` has already
/// passed, in which case no task is spawned.
pub fn spawn_countdown(end: OffsetDateTime, clock: Arc<dyn Clock>, period: Duration) -> CountdownHandle {
    let period = period.max(MIN_PERIOD);
    let initial = remaining(end, clock.now());
    let (tx, rx) = watch::channel(initial);

    if initial.ended {
        return CountdownHandle { rx, task: None, cancelled: AtomicBool::new(false) };
    }

    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            let next = remaining(end, clock.now());
            tx.send_if_modified(|current| {
                if *current == next {
                    return false;
                }
                *current = next;
                true
            });
            if next.ended {
                debug!(%end, "countdown ended");
                break;
            }
        }
    });

    CountdownHandle { rx, task: Some(task), cancelled: AtomicBool::new(false) }
}

#[cfg(test)]
#[path = "ticker_test.rs"]
mod tests;
