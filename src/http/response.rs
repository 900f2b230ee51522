//! Response rendering.
//!
//! # Responsibilities
//! - Render generated text as `{"response": ...}`
//! - Render every gateway error as `{"error": ...}` with its status code
//! - Turn handler panics into the same error shape

use std::any::Any;

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::gateway::GatewayError;

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub response: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ChatReply {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

/// Used by `CatchPanicLayer`: a panic in a handler still gets a JSON 500.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(panic = %detail, "Handler panicked");
    GatewayError::Internal(detail).into_response()
}
