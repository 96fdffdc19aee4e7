use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::document::DocumentChange;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileEvent {
    /// Sent synchronously on every raw change.
    Dirty,
    /// Sent once the input has been quiet for the configured delay.
    Reconcile,
}

struct Schedule {
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

/// Collapses bursts of change notifications into a single reconcile event.
///
/// At most one timer is pending at a time. Scheduling and emitting both happen
/// under the same lock, and a timer only emits if its generation is still the
/// current one, so a superseded timer can never fire after its replacement was
/// scheduled.
///
/// [`Reconciler::notify_change`] spawns onto the ambient tokio runtime and must be
/// called from within one.
pub struct Reconciler {
    delay: Duration,
    schedule: Arc<Mutex<Schedule>>,
    events: broadcast::Sender<ReconcileEvent>,
}

impl Reconciler {
    pub fn new(delay: Duration) -> Self {
        let (events, _) = broadcast::channel(1024);
        Self {
            delay,
            schedule: Arc::new(Mutex::new(Schedule {
                generation: 0,
                pending: None,
            })),
            events,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReconcileEvent> {
        self.events.subscribe()
    }

    pub fn notify_change(&self) {
        let _ = self.events.send(ReconcileEvent::Dirty);

        let mut schedule = lock(&self.schedule);
        schedule.generation += 1;
        let generation = schedule.generation;
        if let Some(previous) = schedule.pending.take() {
            previous.abort();
        }

        let shared = Arc::clone(&self.schedule);
        let events = self.events.clone();
        let delay = self.delay;
        schedule.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut schedule = lock(&shared);
            if schedule.generation != generation {
                return;
            }
            schedule.pending = None;
            debug!(
                generation,
                delay_ms = delay.as_millis() as u64,
                "reconciler: quiet period elapsed"
            );
            let _ = events.send(ReconcileEvent::Reconcile);
        }));
    }

    /// Drops the scheduled emission, if any, without emitting.
    pub fn cancel_pending(&self) {
        let mut schedule = lock(&self.schedule);
        schedule.generation += 1;
        if let Some(pending) = schedule.pending.take() {
            pending.abort();
        }
    }

    pub fn has_pending(&self) -> bool {
        lock(&self.schedule).pending.is_some()
    }

    /// Feeds a document's change stream into [`Reconciler::notify_change`].
    ///
    /// Dirty events produced this way trail the change by one task hop; callers
    /// that need them synchronously should call `notify_change` directly.
    pub fn watch(
        self: &Arc<Self>,
        mut changes: broadcast::Receiver<DocumentChange>,
    ) -> JoinHandle<()> {
        let reconciler = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(_) => reconciler.notify_change(),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "reconciler: change stream lagged");
                        reconciler.notify_change();
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

impl Drop for Reconciler {
    fn drop(&mut self) {
        if let Some(pending) = lock(&self.schedule).pending.take() {
            pending.abort();
        }
    }
}

fn lock(schedule: &Mutex<Schedule>) -> MutexGuard<'_, Schedule> {
    schedule.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[path = "tests/reconciler_tests.rs"]
mod tests;
