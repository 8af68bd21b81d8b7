use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use trellis_core::ManifestLocation;
use trellis_scheduler::{CancellationToken, Cancelled, DebounceTimer, Scheduler};

use crate::state::WorkspaceState;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Where the refresh queue is in its cycle.
///
/// `Idle` may still hold pending locations after a cancelled pass; they are picked up by the
/// next [`RefreshScheduler::queue`] or [`RefreshScheduler::flush`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshPhase {
    Idle,
    /// The debounce timer is armed.
    Pending,
    /// A pass is running.
    Draining,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshEvent {
    /// The debounce timer was (re)armed.
    Scheduled,
    /// A pass published results for these locations.
    Published { locations: Vec<ManifestLocation> },
    /// A pass was abandoned; its locations went back to the queue.
    Cancelled,
}

struct Machine {
    phase: RefreshPhase,
    pending: BTreeSet<ManifestLocation>,
    drain_token: Option<CancellationToken>,
    /// Passes started but still waiting for the workspace lock, by ticket.
    waiting: Vec<(u64, CancellationToken)>,
    next_ticket: u64,
}

struct RefreshInner {
    state: Arc<WorkspaceState>,
    timer: DebounceTimer,
    scheduler: Scheduler,
    machine: Mutex<Machine>,
    events: broadcast::Sender<RefreshEvent>,
}

/// Debounced, coalescing refresh queue with at most one pass in flight.
///
/// Locations queued within the debounce window are merged into one pass. Locations queued while
/// a pass runs are kept for the next one, which is scheduled as soon as the current pass ends.
#[derive(Clone)]
pub struct RefreshScheduler {
    inner: Arc<RefreshInner>,
}

impl RefreshScheduler {
    pub(crate) fn new(state: Arc<WorkspaceState>, scheduler: Scheduler, debounce: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(RefreshInner {
                state,
                timer: DebounceTimer::new(scheduler.clone(), debounce),
                scheduler,
                machine: Mutex::new(Machine {
                    phase: RefreshPhase::Idle,
                    pending: BTreeSet::new(),
                    drain_token: None,
                    waiting: Vec::new(),
                    next_ticket: 0,
                }),
                events,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RefreshEvent> {
        self.inner.events.subscribe()
    }

    pub fn phase(&self) -> RefreshPhase {
        self.inner.machine.lock().phase
    }

    pub fn pending(&self) -> Vec<ManifestLocation> {
        self.inner.machine.lock().pending.iter().cloned().collect()
    }

    pub fn debounce(&self) -> Duration {
        self.inner.timer.delay()
    }

    /// Add locations to the next pass.
    pub fn queue(&self, locations: impl IntoIterator<Item = ManifestLocation>) {
        let mut machine = self.inner.machine.lock();
        machine.pending.extend(locations);
        if machine.pending.is_empty() {
            return;
        }
        match machine.phase {
            // The running pass re-arms when it finishes.
            RefreshPhase::Draining => {}
            RefreshPhase::Idle | RefreshPhase::Pending => {
                machine.phase = RefreshPhase::Pending;
                Self::arm(&self.inner);
            }
        }
    }

    fn arm(inner: &Arc<RefreshInner>) {
        let job_inner = Arc::clone(inner);
        inner
            .timer
            .restart(move |token| Self::drain(&job_inner, &token).map(|_| ()));
        let _ = inner.events.send(RefreshEvent::Scheduled);
        tracing::trace!(target = "trellis.refresh", "refresh scheduled");
    }

    /// Run a pass now on the calling thread, waiting for any pass already in flight.
    ///
    /// Returns the published locations (empty when nothing was pending).
    pub fn flush(&self, token: &CancellationToken) -> Result<Vec<ManifestLocation>, Cancelled> {
        self.inner.timer.cancel();
        Self::drain(&self.inner, &token.child_token())
    }

    /// Disarm the timer and abandon a running pass. Abandoned locations stay pending.
    ///
    /// Returns `false` when there was nothing to cancel.
    pub fn cancel(&self) -> bool {
        let disarmed = self.inner.timer.cancel();
        let mut machine = self.inner.machine.lock();
        let mut running = match &machine.drain_token {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        };
        // Fired but not yet holding the workspace lock.
        for (_, token) in &machine.waiting {
            token.cancel();
            running = true;
        }
        if machine.phase == RefreshPhase::Pending {
            machine.phase = RefreshPhase::Idle;
        }
        // A running pass reports its own cancellation.
        if disarmed && !running {
            let _ = self.inner.events.send(RefreshEvent::Cancelled);
        }
        disarmed || running
    }

    /// Cancel everything, including passes started later by the timer.
    pub fn shutdown(&self) {
        self.cancel();
        self.inner.timer.shutdown();
    }

    fn drain(inner: &Arc<RefreshInner>, token: &CancellationToken) -> Result<Vec<ManifestLocation>, Cancelled> {
        let state = &inner.state;
        let ticket = {
            let mut machine = inner.machine.lock();
            let ticket = machine.next_ticket;
            machine.next_ticket += 1;
            machine.waiting.push((ticket, token.clone()));
            ticket
        };
        let _serialized = state.lock.lock();

        let changed = {
            let mut machine = inner.machine.lock();
            machine.waiting.retain(|(id, _)| *id != ticket);
            if token.is_cancelled() {
                // Cancelled while waiting; the queue is untouched.
                tracing::debug!(target = "trellis.refresh", "refresh pass cancelled before start");
                let _ = inner.events.send(RefreshEvent::Cancelled);
                return Err(Cancelled);
            }
            if machine.pending.is_empty() {
                if machine.phase != RefreshPhase::Pending || !inner.timer.is_armed() {
                    machine.phase = RefreshPhase::Idle;
                }
                return Ok(Vec::new());
            }
            machine.phase = RefreshPhase::Draining;
            machine.drain_token = Some(token.clone());
            std::mem::take(&mut machine.pending)
        };

        let progress = inner
            .scheduler
            .progress()
            .start("Refreshing classpaths", Some(changed.len()));
        let outcome = state.refresh_pass(&changed, token, &progress);

        let mut machine = inner.machine.lock();
        machine.drain_token = None;
        let result = match outcome {
            Ok(published) => {
                progress.finish(Some(format!("{} classpaths updated", published.len())));
                tracing::info!(
                    target = "trellis.refresh",
                    published = published.len(),
                    "refresh pass published"
                );
                let _ = inner.events.send(RefreshEvent::Published {
                    locations: published.clone(),
                });
                Ok(published)
            }
            Err(abandoned) => {
                progress.finish(Some("cancelled".to_string()));
                tracing::info!(
                    target = "trellis.refresh",
                    returned = abandoned.locations.len(),
                    "refresh pass cancelled"
                );
                machine.pending.extend(abandoned.locations);
                let _ = inner.events.send(RefreshEvent::Cancelled);
                Err(Cancelled)
            }
        };

        // Locations that arrived mid-pass get their own pass; a cancelled pass waits.
        if result.is_ok() && !machine.pending.is_empty() {
            machine.phase = RefreshPhase::Pending;
            Self::arm(inner);
        } else {
            machine.phase = RefreshPhase::Idle;
        }
        result
    }
}
