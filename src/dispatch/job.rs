//! Jobs and their outcomes.

use std::fmt;

use serde::Serialize;
use tokio::sync::oneshot;
use tokio::time::Instant;
use uuid::Uuid;

/// Why a job failed. Every kind is terminal once it reaches a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Connectivity problem or unexpected error during the outbound call.
    TransportError,
    /// The remote model is warming up.
    ModelLoading,
    /// Success status, but no usable generated text.
    InvalidResponse,
    /// The remote rejected the credential.
    Unauthorized,
    /// Any other non-success status.
    RemoteError,
    /// Retry ceiling reached without a terminal answer.
    RetriesExhausted,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::TransportError => "transport_error",
            ErrorKind::ModelLoading => "model_loading",
            ErrorKind::InvalidResponse => "invalid_response",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::RemoteError => "remote_error",
            ErrorKind::RetriesExhausted => "retries_exhausted",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success { text: String },
    Failure { kind: ErrorKind, detail: String },
}

impl Outcome {
    pub fn success(text: impl Into<String>) -> Self {
        Outcome::Success { text: text.into() }
    }

    pub fn failure(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Outcome::Failure {
            kind,
            detail: detail.into(),
        }
    }

    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success { .. } => "success",
            Outcome::Failure { kind, .. } => kind.as_str(),
        }
    }
}

/// One caller's message plus the channel its outcome goes back on.
#[derive(Debug)]
pub struct Job {
    pub id: Uuid,
    pub message: String,
    pub reply: oneshot::Sender<Outcome>,
    pub enqueued_at: Instant,
}

impl Job {
    /// Create a job and the receiver its caller waits on.
    pub fn new(message: String) -> (Self, oneshot::Receiver<Outcome>) {
        let (reply, rx) = oneshot::channel();
        let job = Self {
            id: Uuid::new_v4(),
            message,
            reply,
            enqueued_at: Instant::now(),
        };
        (job, rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_display_matches_label() {
        assert_eq!(ErrorKind::ModelLoading.to_string(), "model_loading");
        assert_eq!(ErrorKind::Unauthorized.as_str(), "unauthorized");
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(Outcome::success("hi").label(), "success");
        assert_eq!(
            Outcome::failure(ErrorKind::RetriesExhausted, "").label(),
            "retries_exhausted"
        );
    }

    #[tokio::test]
    async fn test_reply_survives_abandoned_receiver() {
        let (job, rx) = Job::new("hello".into());
        drop(rx);
        // Sending never blocks; the outcome is handed back instead.
        assert!(job.reply.send(Outcome::success("late")).is_err());
    }
}
