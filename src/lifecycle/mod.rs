//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Read credential → Build client → Start dispatcher → Bind HTTP
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain requests → Stop dispatcher → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then the dispatcher, then listeners
//! - The dispatcher finishes its in-flight job before stopping

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
