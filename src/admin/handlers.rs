use axum::{extract::State, Json};
use serde::Serialize;

use crate::dispatch::StatsSnapshot;
use crate::http::server::AppState;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub dispatcher: StatsSnapshot,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        dispatcher: state.dispatcher.stats(),
    })
}
