//! Liveness and registry status.

use axum::Json;
use axum::extract::State;
use runway_core::domain::RegistryStatus;

use crate::state::AppState;

/// Liveness of the gateway itself; independent of any runner.
pub async fn liveness() -> &'static str {
    "OK"
}

pub async fn status(State(state): State<AppState>) -> Json<RegistryStatus> {
    Json(state.registry.status())
}
