pub mod auth;
pub mod handlers;

use axum::{middleware, routing::get, Router};

use self::auth::admin_auth_middleware;
use self::handlers::get_status;
use crate::http::server::AppState;

/// Routes mounted on the main listener when `admin.enabled` is set.
pub fn setup_admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/status", get(get_status))
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}
