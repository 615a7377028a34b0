//! Bounded-concurrency task executor (§4.4).

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashSet;
use tokio::sync::Semaphore;
use tracing::instrument;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A semaphore-bounded task executor. `clear()` drops queued-but-not-yet-
/// running entries by revoking their ticket before they acquire a permit;
/// tasks already executing are left untouched.
pub struct ToolRunner {
    semaphore: Arc<Semaphore>,
    generation: Arc<AtomicU64>,
    pending: Arc<DashSet<u64>>,
    next_ticket: AtomicU64,
}

#[derive(Debug, thiserror::Error)]
pub enum ToolRunnerError {
    #[error("task was cleared before it started")]
    Cleared,
}

impl ToolRunner {
    pub fn new(max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
            generation: Arc::new(AtomicU64::new(0)),
            pending: Arc::new(DashSet::new()),
            next_ticket: AtomicU64::new(0),
        }
    }

    /// Enqueues `task` if permits are exhausted, runs it immediately
    /// otherwise. A task failure releases its permit and surfaces the error
    /// to the submitter without affecting other tasks.
    #[instrument(name = "tool_runner.run", skip(self, task))]
    pub async fn run<F, T>(&self, task: F) -> Result<T, ToolRunnerError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst);
        let generation = self.generation.load(Ordering::SeqCst);
        self.pending.insert(ticket);

        let semaphore = self.semaphore.clone();
        let permit = semaphore
            .acquire_owned()
            .await
            .expect("semaphore never closed");

        let was_cleared = self.generation.load(Ordering::SeqCst) != generation
            && !self.pending.contains(&ticket);
        self.pending.remove(&ticket);
        if was_cleared {
            drop(permit);
            return Err(ToolRunnerError::Cleared);
        }

        let boxed: BoxFuture<T> = Box::pin(task);
        let result = boxed.await;
        drop(permit);
        Ok(result)
    }

    /// Drops pending queue entries without touching tasks already executing.
    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.pending.clear();
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}
