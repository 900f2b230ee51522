//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (delays > 0, backoff ceiling above the first delay)
//! - Validate addresses and the upstream URL
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{RelayConfig, ADMIN_KEY_PLACEHOLDER};

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Check every semantic rule and collect the failures.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    match url::Url::parse(&config.upstream.url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ValidationError::new(
            "upstream.url",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("upstream.url", e.to_string())),
    }

    if config.upstream.api_key_env.trim().is_empty() {
        errors.push(ValidationError::new("upstream.api_key_env", "must not be empty"));
    }

    if config.upstream.request_timeout_secs == 0 {
        errors.push(ValidationError::new("upstream.request_timeout_secs", "must be > 0"));
    }

    let dispatch = &config.dispatch;
    if dispatch.max_retries == 0 {
        errors.push(ValidationError::new("dispatch.max_retries", "must be >= 1"));
    }
    if dispatch.initial_delay_ms == 0 {
        errors.push(ValidationError::new("dispatch.initial_delay_ms", "must be > 0"));
    }
    if dispatch.backoff_multiplier == 0 {
        errors.push(ValidationError::new("dispatch.backoff_multiplier", "must be >= 1"));
    }
    if dispatch.max_backoff_ms < dispatch.initial_delay_ms {
        errors.push(ValidationError::new(
            "dispatch.max_backoff_ms",
            "must be >= dispatch.initial_delay_ms",
        ));
    }

    if config.gateway.max_wait_ms == 0 {
        errors.push(ValidationError::new("gateway.max_wait_ms", "must be > 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if config.admin.enabled {
        let key = config.admin.api_key.trim();
        if key.is_empty() {
            errors.push(ValidationError::new("admin.api_key", "must be set when admin is enabled"));
        } else if key == ADMIN_KEY_PLACEHOLDER {
            errors.push(ValidationError::new(
                "admin.api_key",
                "still the shipped placeholder; set a real key before enabling admin",
            ));
        }
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be > 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
