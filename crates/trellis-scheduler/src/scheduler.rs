use std::sync::Arc;

use rayon::ThreadPool;
use tokio::runtime::Runtime;
use tokio::sync::{broadcast, oneshot};

use trellis_core::panic_payload_to_str;

use crate::{task::BlockingTask, CancellationToken, Cancelled, ProgressSender, TaskError};

enum BlockingPool {
    Rayon(ThreadPool),
    Inline,
}

impl BlockingPool {
    fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match self {
            BlockingPool::Rayon(pool) => pool.spawn(job),
            BlockingPool::Inline => job(),
        }
    }
}

fn build_rayon_pool(prefix: &'static str, threads: usize) -> BlockingPool {
    // Thread creation can fail under tight RLIMIT_NPROC; shrink the pool instead of aborting.
    let mut threads = threads.max(1);
    loop {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(move |idx| format!("{prefix}-{idx}"))
            .build()
        {
            Ok(pool) => return BlockingPool::Rayon(pool),
            Err(_) if threads > 1 => {
                threads = (threads / 2).max(1);
            }
            Err(err) => {
                tracing::warn!(
                    target = "trellis.scheduler",
                    error = %err,
                    "failed to start {prefix} pool; running jobs inline"
                );
                return BlockingPool::Inline;
            }
        }
    }
}

fn build_io_runtime(threads: usize) -> Runtime {
    let mut threads = threads.max(1);
    loop {
        match tokio::runtime::Builder::new_multi_thread()
            .worker_threads(threads)
            .enable_time()
            .thread_name("trellis-timer")
            .build()
        {
            Ok(rt) => return rt,
            Err(_) if threads > 1 => {
                threads = 1;
            }
            Err(err) => {
                return tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                    .unwrap_or_else(|_| panic!("failed to build timer runtime: {err}"));
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Threads used for resolution passes. Passes are serialized by the refresh queue, so one
    /// thread per workspace is enough; extra threads only help `resolve_now` callers.
    pub background_threads: usize,
    pub io_threads: usize,
    pub progress_channel_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            background_threads: available.clamp(1, 2),
            io_threads: 1,
            progress_channel_capacity: 256,
        }
    }
}

#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    background_pool: BlockingPool,
    io_runtime: Option<Runtime>,
    io_handle: tokio::runtime::Handle,
    progress: ProgressSender,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        let io_runtime = build_io_runtime(config.io_threads);
        let io_handle = io_runtime.handle().clone();
        Self::build(config, Some(io_runtime), io_handle)
    }

    /// Build a scheduler whose timers run on an existing Tokio runtime.
    ///
    /// Used from `#[tokio::main]` binaries and `#[tokio::test]` so no second runtime is spawned.
    pub fn new_with_io_handle(config: SchedulerConfig, io_handle: tokio::runtime::Handle) -> Self {
        Self::build(config, None, io_handle)
    }

    fn build(
        config: SchedulerConfig,
        io_runtime: Option<Runtime>,
        io_handle: tokio::runtime::Handle,
    ) -> Self {
        let background_pool = build_rayon_pool("trellis-background", config.background_threads);
        let (progress_tx, _) = broadcast::channel(config.progress_channel_capacity.max(1));

        Self {
            inner: Arc::new(SchedulerInner {
                background_pool,
                io_runtime,
                io_handle,
                progress: ProgressSender::new(progress_tx),
            }),
        }
    }

    pub fn progress(&self) -> ProgressSender {
        self.inner.progress.clone()
    }

    pub fn subscribe_progress(&self) -> broadcast::Receiver<crate::ProgressEvent> {
        self.inner.progress.subscribe()
    }

    pub fn io_handle(&self) -> tokio::runtime::Handle {
        self.inner.io_handle.clone()
    }

    pub fn spawn_background<T, F>(&self, f: F) -> BlockingTask<T>
    where
        T: Send + 'static,
        F: FnOnce(CancellationToken) -> Result<T, Cancelled> + Send + 'static,
    {
        self.spawn_background_with_token(CancellationToken::new(), f)
    }

    /// Run `f` on the background pool.
    ///
    /// Panics inside `f` are caught and surface as [`TaskError::Panicked`]; they never take the
    /// pool thread down.
    pub fn spawn_background_with_token<T, F>(
        &self,
        token: CancellationToken,
        f: F,
    ) -> BlockingTask<T>
    where
        T: Send + 'static,
        F: FnOnce(CancellationToken) -> Result<T, Cancelled> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        if token.is_cancelled() {
            let _ = tx.send(Err(TaskError::Cancelled));
            return BlockingTask::new(rx);
        }

        let token_for_job = token.clone();
        let job = move || {
            let result =
                match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(token_for_job))) {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(err)) => Err(TaskError::from(err)),
                    Err(panic) => {
                        let message = panic_payload_to_str(&*panic);
                        tracing::error!(
                            target = "trellis.scheduler",
                            panic = %message,
                            "background task panicked"
                        );
                        Err(TaskError::Panicked)
                    }
                };
            let _ = tx.send(result);
        };

        self.inner.background_pool.spawn(job);
        BlockingTask::new(rx)
    }
}

impl Drop for SchedulerInner {
    fn drop(&mut self) {
        if let Some(runtime) = self.io_runtime.take() {
            runtime.shutdown_background();
        }
    }
}
