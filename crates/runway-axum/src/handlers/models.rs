//! Model load/unload on the active runner.

use axum::Json;
use axum::extract::State;
use runway_core::domain::RegistryStatus;
use serde::{Deserialize, Serialize};

use crate::error::HttpError;
use crate::state::AppState;

/// Body of `POST /v1/models/load`.
#[derive(Debug, Deserialize)]
pub struct LoadModelBody {
    /// Model identifier or model file path.
    #[serde(alias = "model")]
    pub path: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnloadResponse {
    pub unloaded: bool,
}

pub async fn load(
    State(state): State<AppState>,
    Json(body): Json<LoadModelBody>,
) -> Result<Json<RegistryStatus>, HttpError> {
    let model = body.path.trim();
    if model.is_empty() {
        return Err(HttpError::BadRequest("path must not be empty".to_string()));
    }
    state.registry.load_model(model).await?;
    Ok(Json(state.registry.status()))
}

pub async fn unload(State(state): State<AppState>) -> Result<Json<UnloadResponse>, HttpError> {
    let unloaded = state.registry.unload_model().await?;
    Ok(Json(UnloadResponse { unloaded }))
}
