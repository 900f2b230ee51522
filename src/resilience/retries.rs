//! Retry classification.
//!
//! # Responsibilities
//! - Decide whether a remote reply is terminal or worth retrying
//! - Pull the generated text out of a success payload
//! - Read the remote's advertised warm-up time
//!
//! # Design Decisions
//! - 200, 401 and every other status except a loading 503 are terminal
//! - A 503 is only retryable when the body says the model is loading
//! - Transport errors never reach this module; the worker retries them directly

use std::time::Duration;

use serde_json::Value;

use crate::dispatch::{ErrorKind, Outcome};
use crate::upstream::RawReply;

/// What the worker should do with one reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Stop retrying and deliver this outcome.
    Resolved(Outcome),
    /// The model is warming up; wait and try again.
    Loading { estimated: Option<Duration> },
}

pub fn classify(reply: RawReply) -> Verdict {
    match reply.status {
        200 => Verdict::Resolved(extract_generated_text(&reply.body)),
        503 if is_loading(&reply.body) => Verdict::Loading {
            estimated: estimated_wait(&reply.body),
        },
        401 => Verdict::Resolved(Outcome::failure(ErrorKind::Unauthorized, reply.body)),
        _ => Verdict::Resolved(Outcome::failure(ErrorKind::RemoteError, reply.body)),
    }
}

/// Accepts `[{"generated_text": ..}]` (the remote's native shape) or a bare object.
fn extract_generated_text(body: &str) -> Outcome {
    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => {
            return Outcome::failure(ErrorKind::InvalidResponse, format!("unparseable body: {}", e))
        }
    };

    let candidate = match &value {
        Value::Array(items) => items.first(),
        other => Some(other),
    };

    match candidate
        .and_then(|item| item.get("generated_text"))
        .and_then(Value::as_str)
    {
        Some(text) if !text.is_empty() => Outcome::success(text),
        Some(_) => Outcome::failure(ErrorKind::InvalidResponse, "empty generated_text"),
        None => Outcome::failure(ErrorKind::InvalidResponse, "missing generated_text"),
    }
}

fn is_loading(body: &str) -> bool {
    body.to_ascii_lowercase().contains("loading")
}

fn estimated_wait(body: &str) -> Option<Duration> {
    serde_json::from_str::<Value>(body)
        .ok()?
        .get("estimated_time")?
        .as_f64()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX))
}
