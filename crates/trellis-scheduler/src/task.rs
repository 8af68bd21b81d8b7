use tokio::sync::oneshot;

use crate::TaskError;

/// Handle to work running on the background pool.
pub struct BlockingTask<T> {
    rx: oneshot::Receiver<Result<T, TaskError>>,
}

impl<T> BlockingTask<T> {
    pub(crate) fn new(rx: oneshot::Receiver<Result<T, TaskError>>) -> Self {
        Self { rx }
    }

    /// Wait for the job's own result.
    ///
    /// Unlike a select on the token, this waits for the job to observe cancellation itself, so
    /// callers know the job is no longer touching shared state when `join` returns.
    pub async fn join(self) -> Result<T, TaskError> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(TaskError::Panicked),
        }
    }
}
