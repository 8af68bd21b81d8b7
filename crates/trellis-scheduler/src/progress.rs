use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgressId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Begin {
        id: ProgressId,
        title: String,
        total: Option<usize>,
    },
    Report {
        id: ProgressId,
        message: Option<String>,
        done: usize,
        total: Option<usize>,
    },
    End {
        id: ProgressId,
        message: Option<String>,
    },
}

pub type ProgressReceiver = broadcast::Receiver<ProgressEvent>;

#[derive(Clone)]
pub struct ProgressSender {
    tx: broadcast::Sender<ProgressEvent>,
    next_id: Arc<AtomicU64>,
}

impl ProgressSender {
    pub(crate) fn new(tx: broadcast::Sender<ProgressEvent>) -> Self {
        Self {
            tx,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn subscribe(&self) -> ProgressReceiver {
        self.tx.subscribe()
    }

    /// Begin a unit of work with `total` steps (if known).
    pub fn start(&self, title: impl Into<String>, total: Option<usize>) -> Progress {
        let id = ProgressId(self.next_id.fetch_add(1, Ordering::Relaxed));
        // No subscribers is fine.
        let _ = self.tx.send(ProgressEvent::Begin {
            id,
            title: title.into(),
            total,
        });
        Progress {
            id,
            total,
            done: Arc::new(AtomicU64::new(0)),
            tx: self.tx.clone(),
            finished: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// A running unit of work. Dropping it ends the progress if `finish` was not called.
#[derive(Clone)]
pub struct Progress {
    id: ProgressId,
    total: Option<usize>,
    done: Arc<AtomicU64>,
    tx: broadcast::Sender<ProgressEvent>,
    finished: Arc<AtomicBool>,
}

impl Progress {
    pub fn id(&self) -> ProgressId {
        self.id
    }

    /// Record one completed step.
    pub fn step(&self, message: impl Into<Option<String>>) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) as usize + 1;
        let _ = self.tx.send(ProgressEvent::Report {
            id: self.id,
            message: message.into(),
            done,
            total: self.total,
        });
    }

    pub fn finish(&self, message: impl Into<Option<String>>) {
        let message = message.into();
        if self
            .finished
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let _ = self.tx.send(ProgressEvent::End {
                id: self.id,
                message,
            });
        }
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        // Clones share `finished`; only the last one standing matters in practice.
        if Arc::strong_count(&self.finished) == 1 {
            self.finish(None);
        }
    }
}
