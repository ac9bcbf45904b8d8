//! Runner listing, switching and logs.

use axum::Json;
use axum::extract::{Path, State};
use runway_core::domain::{BackendKind, RegistryStatus, RunnerDescriptor};
use runway_core::ports::OutputLine;
use serde::{Deserialize, Serialize};

use crate::error::HttpError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnersResponse {
    pub active: Option<String>,
    pub runners: Vec<RunnerDescriptor>,
}

pub async fn list(State(state): State<AppState>) -> Json<RunnersResponse> {
    let runners = state.registry.runners();
    let active = runners.iter().find(|r| r.active).map(|r| r.name.clone());
    Json(RunnersResponse { active, runners })
}

/// Body of `POST /v1/runners/switch`: a runner name, or an endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchBody {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

pub async fn switch(
    State(state): State<AppState>,
    Json(body): Json<SwitchBody>,
) -> Result<Json<RegistryStatus>, HttpError> {
    match (body.name, body.base_url) {
        (Some(name), _) => {
            state
                .registry
                .switch_to_with_model(&name, body.model.as_deref())
                .await?;
        }
        (None, Some(base_url)) => {
            let kind = match body.kind.as_deref() {
                Some(raw) => raw
                    .parse::<BackendKind>()
                    .map_err(|e| HttpError::BadRequest(e.to_string()))?,
                None => BackendKind::RemoteHttp,
            };
            state
                .registry
                .switch_to_endpoint(kind, &base_url, body.model.as_deref())
                .await?;
        }
        (None, None) => {
            return Err(HttpError::BadRequest(
                "expected `name` or `baseUrl` in request body".to_string(),
            ));
        }
    }
    Ok(Json(state.registry.status()))
}

pub async fn logs(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<OutputLine>>, HttpError> {
    Ok(Json(state.registry.logs(&name)?))
}
