//! Outbound calls to the remote inference endpoint.
//!
//! # Data Flow
//! ```text
//! dispatcher worker
//!     → InferenceBackend::generate(message)
//!     → client.rs (POST {"inputs": message}, bearer credential)
//!     → RawReply { status, body }  |  CallError
//!     → dispatch::classify
//! ```
//!
//! # Design Decisions
//! - The backend only reports what happened on the wire; deciding whether a
//!   reply is terminal or retryable belongs to the dispatcher
//! - Static dispatch: the worker is generic over the backend

pub mod client;

use std::future::Future;

use thiserror::Error;

pub use client::HttpInferenceClient;

/// An HTTP exchange with the remote service that completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReply {
    pub status: u16,
    pub body: String,
}

impl RawReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Failure to obtain any reply from the remote service.
#[derive(Debug, Clone, Error)]
pub enum CallError {
    /// Connect error, timeout, or the body could not be read.
    #[error("transport error: {0}")]
    Transport(String),

    /// Anything else that went wrong while making the call.
    #[error("unexpected error: {0}")]
    Internal(String),
}

/// Something that can turn a message into a raw reply from a text-generation model.
pub trait InferenceBackend: Send + Sync + 'static {
    fn generate(&self, message: &str) -> impl Future<Output = Result<RawReply, CallError>> + Send;
}
