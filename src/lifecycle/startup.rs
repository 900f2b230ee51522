//! Startup orchestration.
//!
//! # Responsibilities
//! - Read the upstream credential once
//! - Start the dispatcher before any traffic is accepted
//! - Serve HTTP until shutdown, then wait for the dispatcher to stop
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - A missing credential is not a startup error; it surfaces as unauthorized outcomes

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::RelayConfig;
use crate::dispatch::Dispatcher;
use crate::gateway::Gateway;
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::resilience::RetryPolicy;
use crate::upstream::{CallError, HttpInferenceClient, InferenceBackend};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to build inference client: {0}")]
    Client(#[from] CallError),

    #[error("HTTP server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read the bearer credential from the named environment variable.
pub fn read_api_key(env_var: &str) -> Option<String> {
    std::env::var(env_var)
        .ok()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
}

/// Run the relay against the configured remote endpoint.
pub async fn launch(
    config: RelayConfig,
    listener: TcpListener,
    shutdown: Shutdown,
) -> Result<(), StartupError> {
    let api_key = read_api_key(&config.upstream.api_key_env);
    let client = HttpInferenceClient::new(&config.upstream, api_key)?;
    tracing::info!(url = %client.url(), "Inference client ready");

    launch_with_backend(config, client, listener, shutdown).await
}

/// Run the relay with any backend; the seam integration tests use.
pub async fn launch_with_backend<B: InferenceBackend>(
    config: RelayConfig,
    backend: B,
    listener: TcpListener,
    shutdown: Shutdown,
) -> Result<(), StartupError> {
    let (dispatcher, handle) = Dispatcher::new(backend, RetryPolicy::from(&config.dispatch));
    let worker = dispatcher.start(shutdown.subscribe());

    let gateway = Gateway::new(handle.clone(), config.gateway.max_wait());
    let server = HttpServer::new(&config, gateway, handle);
    server.run(listener, shutdown.subscribe()).await?;

    if let Err(e) = worker.await {
        tracing::warn!(error = %e, "Dispatcher supervisor ended abnormally");
    }
    tracing::info!("Relay stopped");
    Ok(())
}
