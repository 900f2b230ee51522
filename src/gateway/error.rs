//! Caller-facing errors.

use axum::http::StatusCode;
use thiserror::Error;

use crate::dispatch::ErrorKind;

/// Everything a caller can get back instead of generated text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("Message cannot be empty")]
    EmptyMessage,

    #[error("Invalid JSON payload")]
    MalformedPayload,

    #[error("Only POST method is allowed.")]
    MethodNotAllowed,

    #[error("The request timed out. Please try again later.")]
    Timeout,

    #[error("{}", describe_failure(.kind, .detail))]
    Upstream { kind: ErrorKind, detail: String },

    #[error("Unexpected error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::EmptyMessage | GatewayError::MalformedPayload => StatusCode::BAD_REQUEST,
            GatewayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Upstream { kind, .. } => match kind {
                ErrorKind::RetriesExhausted | ErrorKind::ModelLoading => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                ErrorKind::TransportError
                | ErrorKind::InvalidResponse
                | ErrorKind::Unauthorized
                | ErrorKind::RemoteError => StatusCode::BAD_GATEWAY,
            },
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn describe_failure(kind: &ErrorKind, detail: &str) -> String {
    match kind {
        ErrorKind::TransportError => format!("Could not reach the inference service: {}", detail),
        ErrorKind::ModelLoading => "The model is still loading. Please try again later.".to_string(),
        ErrorKind::InvalidResponse => "No valid response from model.".to_string(),
        ErrorKind::Unauthorized => "Unauthorized. Check your API key.".to_string(),
        ErrorKind::RemoteError => format!("Inference API error: {}", detail),
        ErrorKind::RetriesExhausted => {
            "Unable to process your request after multiple attempts. Please try again later."
                .to_string()
        }
    }
}
