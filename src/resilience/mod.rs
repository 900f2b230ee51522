//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Reply from the inference endpoint:
//!     → retries.rs (terminal or retryable? extract generated text)
//!     → On retryable: backoff.rs (how long to wait, attempt bookkeeping)
//!
//! Transport failure:
//!     → backoff.rs directly (exponential delay, capped)
//! ```
//!
//! # Design Decisions
//! - Every job gets its own RetryState; nothing is shared between jobs
//! - Warm-up waits follow the remote's estimate and do not grow the delay
//! - Every wait is capped at the configured ceiling

pub mod backoff;
pub mod retries;

pub use backoff::{RetryPolicy, RetryState};
pub use retries::{classify, Verdict};
