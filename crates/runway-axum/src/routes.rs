//! Route definitions and router construction.

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::bootstrap::CorsConfig;
use crate::handlers;
use crate::state::AppState;

/// Build CORS layer from configuration.
fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    match config {
        CorsConfig::AllowAll => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        CorsConfig::AllowOrigins(origins) => {
            let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(allowed)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }
}

/// Build the gateway router.
pub fn create_router(state: AppState, cors: &CorsConfig) -> Router {
    Router::new()
        .route("/health", get(handlers::health::liveness))
        .route("/status", get(handlers::health::status))
        .route("/v1/chat/completions", post(handlers::chat::completions))
        .route("/v1/runners", get(handlers::runners::list))
        .route("/v1/runners/switch", post(handlers::runners::switch))
        .route("/v1/runners/{name}/logs", get(handlers::runners::logs))
        .route(
            "/v1/models/load",
            post(handlers::models::load).delete(handlers::models::unload),
        )
        .route("/v1/events", get(handlers::events::stream))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(cors))
        .with_state(state)
}
