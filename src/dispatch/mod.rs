//! Single-worker dispatch queue.
//!
//! # Data Flow
//! ```text
//! Gateway ──enqueue(Job)──▶ unbounded mpsc ──▶ worker.rs (one job at a time)
//!                                                 │  upstream call
//!                                                 │  resilience::classify / backoff
//!                                                 ▼
//! Gateway ◀──────────── oneshot reply ◀──── Outcome
//! ```
//!
//! # Design Decisions
//! - One consumer: outbound calls are strictly serialized and FIFO
//! - Replies are oneshot channels, so delivery never blocks even after the
//!   caller gave up waiting
//! - A supervisor respawns the worker if it panics; the queue survives
//! - No cancellation crosses the queue: a dequeued job always runs to completion

pub mod handle;
pub mod job;
mod supervisor;
pub mod worker;

pub use handle::{DispatchError, DispatchStats, DispatcherHandle, StatsSnapshot};
pub use job::{ErrorKind, Job, Outcome};
pub use worker::{Dispatcher, Resolution, WorkerExit};
