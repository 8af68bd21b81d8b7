//! Background execution for Trellis.
//!
//! - a rayon pool for blocking work (resolution passes)
//! - a Tokio runtime for timers
//! - cooperative cancellation via [`CancellationToken`]
//! - progress events over a broadcast channel
//! - [`DebounceTimer`], a restartable single-shot timer used by the refresh queue

mod debounce;
mod progress;
mod scheduler;
mod task;

pub use debounce::DebounceTimer;
pub use progress::{Progress, ProgressEvent, ProgressId, ProgressReceiver, ProgressSender};
pub use scheduler::{Scheduler, SchedulerConfig};
pub use task::BlockingTask;
pub use tokio_util::sync::CancellationToken;

/// Returned by cooperative work that observed a cancelled token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, thiserror::Error)]
#[error("operation cancelled")]
pub struct Cancelled;

impl Cancelled {
    /// `Err(Cancelled)` once `token` has been cancelled.
    #[inline]
    pub fn check(token: &CancellationToken) -> Result<(), Cancelled> {
        if token.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("task was cancelled")]
    Cancelled,
    #[error("task panicked")]
    Panicked,
}

impl From<Cancelled> for TaskError {
    fn from(_: Cancelled) -> Self {
        TaskError::Cancelled
    }
}
