//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, limits, request ID, panic capture)
//! - Bind server to listener with graceful shutdown
//! - Hand chat payloads to the gateway and render its result

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::admin;
use crate::config::RelayConfig;
use crate::dispatch::DispatcherHandle;
use crate::gateway::{Gateway, GatewayError};
use crate::http::request::{request_id, UuidRequestId};
use crate::http::response::{panic_response, ChatReply};
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Gateway,
    pub dispatcher: DispatcherHandle,
    pub admin_key: String,
}

/// HTTP server for the relay.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: &RelayConfig, gateway: Gateway, dispatcher: DispatcherHandle) -> Self {
        let state = AppState {
            gateway,
            dispatcher,
            admin_key: config.admin.api_key.clone(),
        };
        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &RelayConfig, state: AppState) -> Router {
        let mut router = Router::new()
            .route("/api/chat/", post(chat_handler).fallback(method_not_allowed))
            .route("/api/chat", post(chat_handler).fallback(method_not_allowed))
            .route("/health", get(health));

        if config.admin.enabled {
            router = router.merge(admin::setup_admin_router(state.clone()));
        }

        router.with_state(state).layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CatchPanicLayer::custom(panic_response))
                .layer(RequestBodyLimitLayer::new(config.security.max_body_size)),
        )
    }

    /// The fully layered router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until a shutdown signal arrives, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn chat_handler(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let request_id = request_id(&headers);
    tracing::debug!(request_id = %request_id, bytes = body.len(), "Chat request received");

    let response = match state.gateway.submit(&body).await {
        Ok(text) => ChatReply { response: text }.into_response(),
        Err(e) => {
            if e.status().is_server_error() {
                tracing::error!(request_id = %request_id, error = %e, "Chat request failed");
            } else {
                tracing::debug!(request_id = %request_id, error = %e, "Chat request rejected");
            }
            e.into_response()
        }
    };

    metrics::record_gateway_request(response.status().as_u16());
    response
}

async fn method_not_allowed() -> GatewayError {
    metrics::record_gateway_request(405);
    GatewayError::MethodNotAllowed
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
