use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::Mutex;

use crate::{CancellationToken, Cancelled, Scheduler};

struct ArmedTimer {
    id: u64,
    token: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

struct TimerInner {
    scheduler: Scheduler,
    delay: Duration,
    next_id: AtomicU64,
    root: CancellationToken,
    armed: Mutex<Option<ArmedTimer>>,
}

/// A restartable single-shot timer.
///
/// [`DebounceTimer::restart`] (re)arms the timer; when it fires, the job runs on the scheduler's
/// background pool. The timer is disarmed *before* the job starts, so a job may call `restart`
/// to schedule its own follow-up without cancelling itself.
#[derive(Clone)]
pub struct DebounceTimer {
    inner: Arc<TimerInner>,
}

impl DebounceTimer {
    pub fn new(scheduler: Scheduler, delay: Duration) -> Self {
        Self {
            inner: Arc::new(TimerInner {
                scheduler,
                delay,
                next_id: AtomicU64::new(1),
                root: CancellationToken::new(),
                armed: Mutex::new(None),
            }),
        }
    }

    pub fn delay(&self) -> Duration {
        self.inner.delay
    }

    /// `true` while the timer is waiting to fire.
    pub fn is_armed(&self) -> bool {
        self.inner.armed.lock().is_some()
    }

    /// Arm the timer with `f`, replacing any job still waiting to fire.
    pub fn restart<F>(&self, f: F)
    where
        F: FnOnce(CancellationToken) -> Result<(), Cancelled> + Send + 'static,
    {
        let delay = self.inner.delay;
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let token = self.inner.root.child_token();

        let inner = Arc::clone(&self.inner);
        let token_for_task = token.clone();
        let mut f = Some(f);

        // Hold the slot while spawning so a fast timer cannot disarm before we record it.
        let mut armed = self.inner.armed.lock();
        if let Some(previous) = armed.take() {
            previous.token.cancel();
            previous.handle.abort();
        }

        let handle = inner.scheduler.io_handle().spawn({
            let inner = Arc::clone(&inner);
            async move {
                tokio::select! {
                    _ = token_for_task.cancelled() => {}
                    _ = tokio::time::sleep(delay) => {
                        {
                            let mut armed = inner.armed.lock();
                            if armed.as_ref().is_some_and(|current| current.id == id) {
                                *armed = None;
                            } else {
                                return;
                            }
                        }
                        if let Some(f) = f.take() {
                            let task = inner
                                .scheduler
                                .spawn_background_with_token(token_for_task.clone(), f);
                            if let Err(err) = task.join().await {
                                tracing::debug!(
                                    target = "trellis.scheduler",
                                    error = %err,
                                    "debounced job did not complete"
                                );
                            }
                        }
                    }
                }
            }
        });

        *armed = Some(ArmedTimer { id, token, handle });
    }

    /// Disarm a waiting timer. Returns `false` if nothing was armed.
    ///
    /// A job that already started is not affected; use [`DebounceTimer::shutdown`] for that.
    pub fn cancel(&self) -> bool {
        let Some(entry) = self.inner.armed.lock().take() else {
            return false;
        };
        entry.token.cancel();
        entry.handle.abort();
        true
    }

    /// Cancel the armed timer and every job started by this timer.
    pub fn shutdown(&self) {
        self.cancel();
        self.inner.root.cancel();
    }
}
