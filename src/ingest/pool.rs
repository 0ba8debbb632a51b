//! pool.rs
//!
//! Fixed-size set of workers draining a shared bounded queue of input lines.
//!
//! Each worker takes the next line, wraps it into a `Document` stamped with
//! the current time and inserts it into the store. A failed insert is logged
//! and the worker moves on. There is no ordering across workers.
//!
//! Shutdown is a graceful drain: `join` closes the queue, every worker
//! finishes what is left, and `join` returns once all of them have exited.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::client::store::Store;
use crate::transform::document::Document;

pub const DEFAULT_WORKERS: usize = 5;
pub const DEFAULT_QUEUE_CAPACITY: usize = 1;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("invalid pool settings: {0}")]
    InvalidSettings(String),

    #[error("ingestion queue is closed")]
    Closed,
}

#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub workers: usize,
    pub queue_capacity: usize,
    pub index: String,
    pub tool_name: String,
}

impl PoolSettings {
    pub fn new(index: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            index: index.into(),
            tool_name: tool_name.into(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    fn validate(&self) -> Result<(), PoolError> {
        if self.workers == 0 {
            return Err(PoolError::InvalidSettings(
                "worker count must be at least 1".into(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(PoolError::InvalidSettings(
                "queue capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Outcome counts for one worker or the whole pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolSummary {
    pub inserted: usize,
    pub failed: usize,
}

impl PoolSummary {
    pub fn attempted(&self) -> usize {
        self.inserted + self.failed
    }

    fn add(&mut self, other: PoolSummary) {
        self.inserted += other.inserted;
        self.failed += other.failed;
    }
}

/// Handle to a running pool. Lines go in through `submit`.
pub struct IngestPool {
    sender: mpsc::Sender<String>,
    workers: Vec<JoinHandle<PoolSummary>>,
}

/// Shared state a worker needs. Read-only after spawn.
struct WorkerCtx<S> {
    store: Arc<S>,
    index: Arc<str>,
    tool_name: Arc<str>,
    queue: Arc<Mutex<mpsc::Receiver<String>>>,
}

impl IngestPool {
    /// Spawn all workers. Must be called inside a tokio runtime.
    pub fn start<S: Store>(store: Arc<S>, settings: PoolSettings) -> Result<Self, PoolError> {
        settings.validate()?;

        let (sender, receiver) = mpsc::channel::<String>(settings.queue_capacity);
        let queue = Arc::new(Mutex::new(receiver));
        let index: Arc<str> = settings.index.into();
        let tool_name: Arc<str> = settings.tool_name.into();

        let workers = (0..settings.workers)
            .map(|id| {
                let ctx = WorkerCtx {
                    store: Arc::clone(&store),
                    index: Arc::clone(&index),
                    tool_name: Arc::clone(&tool_name),
                    queue: Arc::clone(&queue),
                };
                tokio::spawn(run_worker(id, ctx))
            })
            .collect();

        Ok(Self { sender, workers })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Queue one line. Waits while the queue is full.
    pub async fn submit(&self, line: String) -> Result<(), PoolError> {
        self.sender.send(line).await.map_err(|_| PoolError::Closed)
    }

    /// Close the queue and wait for every worker to drain and exit.
    pub async fn join(self) -> PoolSummary {
        let Self { sender, workers } = self;
        drop(sender);

        let mut summary = PoolSummary::default();
        for (id, handle) in workers.into_iter().enumerate() {
            match handle.await {
                Ok(s) => summary.add(s),
                Err(e) => tracing::error!(worker = id, "ingestion worker died: {e}"),
            }
        }
        summary
    }
}

async fn run_worker<S: Store>(id: usize, ctx: WorkerCtx<S>) -> PoolSummary {
    let mut summary = PoolSummary::default();
    loop {
        // Hold the lock only while waiting for the next line.
        let next = { ctx.queue.lock().await.recv().await };
        let Some(line) = next else { break };

        let doc = Document::now(line, &*ctx.tool_name);
        match ctx.store.insert(&ctx.index, &doc).await {
            Ok(()) => {
                summary.inserted += 1;
                tracing::info!(worker = id, "Document inserted into index {}", ctx.index);
            }
            Err(e) => {
                summary.failed += 1;
                tracing::warn!(worker = id, "Failed to insert document: {e}");
            }
        }
    }
    tracing::debug!(worker = id, "queue closed, worker exiting");
    summary
}
