//! OpenAI-compatible chat completions.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use runway_core::domain::{ChatRequest, ChatResponse};
use runway_core::ports::RegistryError;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::HttpError;
use crate::fallback;
use crate::state::AppState;

/// Forward a chat request to the active runner.
///
/// The request is cancelled upstream if the client disconnects. When no
/// runner is healthy the reply is either 503 or, with `allowFallback`, a
/// deterministic fallback.
pub async fn completions(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, HttpError> {
    let Json(request) = body.map_err(|e| HttpError::BadRequest(e.body_text()))?;
    if request.is_streaming() {
        return Err(HttpError::BadRequest(
            "stream: true is not supported".to_string(),
        ));
    }
    debug!(model = ?request.model, messages = request.messages.len(), "POST /v1/chat/completions");

    // Dropping the handler future (client gone) cancels the upstream call
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    match state.registry.chat(request.clone(), cancel).await {
        Ok(response) => Ok(Json(response)),
        Err(RegistryError::NoBackendAvailable) if state.allow_fallback => {
            debug!("No backend available, answering with fallback reply");
            Ok(Json(fallback::reply(&request)))
        }
        Err(e) => Err(e.into()),
    }
}
