//! Inference endpoint client with timeout and error handling.
//!
//! # Responsibilities
//! - POST the caller's message to the model endpoint
//! - Attach the bearer credential when one was configured
//! - Map reqwest failures onto transport vs. unexpected errors

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;

use crate::config::UpstreamConfig;
use crate::upstream::{CallError, InferenceBackend, RawReply};

#[derive(Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
}

/// reqwest-backed client for a hosted text-generation model.
#[derive(Clone)]
pub struct HttpInferenceClient {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl HttpInferenceClient {
    /// Build a client for the configured endpoint.
    ///
    /// `api_key` is read once by the caller at startup. `None` means requests go
    /// out unauthenticated and the remote will answer 401.
    pub fn new(config: &UpstreamConfig, api_key: Option<String>) -> Result<Self, CallError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| CallError::Internal(e.to_string()))?;

        if api_key.is_none() {
            tracing::warn!(
                env = %config.api_key_env,
                "No inference API key configured; upstream calls will be rejected as unauthorized"
            );
        }

        Ok(Self {
            client,
            url: config.url.clone(),
            api_key,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl InferenceBackend for HttpInferenceClient {
    async fn generate(&self, message: &str) -> Result<RawReply, CallError> {
        let mut request = self
            .client
            .post(&self.url)
            .json(&InferenceRequest { inputs: message });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_reqwest_error)?;

        Ok(RawReply { status, body })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> CallError {
    if e.is_builder() {
        CallError::Internal(e.to_string())
    } else {
        CallError::Transport(e.to_string())
    }
}

impl std::fmt::Debug for HttpInferenceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpInferenceClient")
            .field("url", &self.url)
            .field("authenticated", &self.api_key.is_some())
            .finish()
    }
}
