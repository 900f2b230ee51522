//! Request/response adapter between callers and the dispatcher.
//!
//! # Flow
//! ```text
//! Received → Validated → Enqueued → Resolved | TimedOut
//! ```
//!
//! # Design Decisions
//! - Validation failures never create a job
//! - The wait is the only cancellable step; timing out leaves the job queued
//!   or in flight and its outcome is discarded by the worker

pub mod error;

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::dispatch::{DispatcherHandle, Outcome};

pub use error::GatewayError;

#[derive(Debug, Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: String,
}

#[derive(Clone, Debug)]
pub struct Gateway {
    dispatcher: DispatcherHandle,
    max_wait: Duration,
}

impl Gateway {
    pub fn new(dispatcher: DispatcherHandle, max_wait: Duration) -> Self {
        Self {
            dispatcher,
            max_wait,
        }
    }

    /// Handle a raw `{"message": ...}` payload.
    ///
    /// Only a JSON object is accepted; arrays and scalars are malformed.
    pub async fn submit(&self, payload: &[u8]) -> Result<String, GatewayError> {
        let request = parse_request(payload).map_err(|e| {
            tracing::warn!(error = %e, "Invalid JSON payload received");
            GatewayError::MalformedPayload
        })?;
        self.ask(&request.message).await
    }

    /// Queue a message and wait for its outcome, up to `max_wait`.
    pub async fn ask(&self, message: &str) -> Result<String, GatewayError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(GatewayError::EmptyMessage);
        }

        let (job_id, reply) = self
            .dispatcher
            .enqueue(message.to_string())
            .map_err(|e| GatewayError::Internal(e.to_string()))?;

        match tokio::time::timeout(self.max_wait, reply).await {
            Ok(Ok(Outcome::Success { text })) => Ok(text),
            Ok(Ok(Outcome::Failure { kind, detail })) => Err(GatewayError::Upstream { kind, detail }),
            Ok(Err(_)) => {
                tracing::error!(job_id = %job_id, "Dispatcher dropped the job without an outcome");
                Err(GatewayError::Internal("request was dropped by the dispatcher".to_string()))
            }
            Err(_) => {
                tracing::error!(
                    job_id = %job_id,
                    max_wait_ms = self.max_wait.as_millis() as u64,
                    "Response wait timed out"
                );
                Err(GatewayError::Timeout)
            }
        }
    }
}

fn parse_request(payload: &[u8]) -> Result<ChatRequest, serde_json::Error> {
    match serde_json::from_slice::<Value>(payload)? {
        object @ Value::Object(_) => ChatRequest::deserialize(object),
        other => Err(serde::de::Error::custom(format!(
            "expected a JSON object, found {}",
            json_type(&other)
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
