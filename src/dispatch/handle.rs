//! Producer side of the dispatch queue.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::dispatch::job::{Job, Outcome};
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatcher is not running")]
    Stopped,
}

/// Counters shared between the handle and the worker.
#[derive(Debug, Default)]
pub struct DispatchStats {
    enqueued: AtomicU64,
    dequeued: AtomicU64,
    completed: AtomicU64,
    in_flight: AtomicBool,
    restarts: AtomicU64,
}

impl DispatchStats {
    fn queue_depth(&self) -> u64 {
        self.enqueued
            .load(Ordering::Relaxed)
            .saturating_sub(self.dequeued.load(Ordering::Relaxed))
    }

    pub(crate) fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        metrics::set_queue_depth(self.queue_depth());
    }

    pub(crate) fn record_dequeued(&self) {
        self.dequeued.fetch_add(1, Ordering::Relaxed);
        self.in_flight.store(true, Ordering::Relaxed);
        metrics::set_queue_depth(self.queue_depth());
    }

    pub(crate) fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.in_flight.store(false, Ordering::Relaxed);
    }

    pub(crate) fn record_restart(&self) {
        self.restarts.fetch_add(1, Ordering::Relaxed);
        self.in_flight.store(false, Ordering::Relaxed);
        metrics::record_dispatcher_restart();
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            queue_depth: self.queue_depth(),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            restarts: self.restarts.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the dispatcher, served by the admin endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub enqueued: u64,
    pub completed: u64,
    pub queue_depth: u64,
    pub in_flight: bool,
    pub restarts: u64,
}

/// Cloneable entry point for submitting jobs to the single worker.
#[derive(Clone, Debug)]
pub struct DispatcherHandle {
    tx: mpsc::UnboundedSender<Job>,
    stats: Arc<DispatchStats>,
}

impl DispatcherHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Job>, stats: Arc<DispatchStats>) -> Self {
        Self { tx, stats }
    }

    /// Queue a message and return the receiver its outcome will arrive on.
    ///
    /// Never blocks: the queue is unbounded.
    pub fn enqueue(&self, message: String) -> Result<(Uuid, oneshot::Receiver<Outcome>), DispatchError> {
        let (job, rx) = Job::new(message);
        let id = job.id;
        self.tx.send(job).map_err(|_| DispatchError::Stopped)?;
        self.stats.record_enqueued();
        tracing::debug!(job_id = %id, "Job enqueued");
        Ok((id, rx))
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}
