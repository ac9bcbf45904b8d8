#![deny(unsafe_code)]
//! HTTP gateway in front of a [`RunnerRegistry`](runway_runtime::RunnerRegistry).
//!
//! Handlers hold no registry logic: they parse the request, call the
//! registry and map [`RegistryError`](runway_core::RegistryError) onto
//! [`HttpError`].

pub mod bootstrap;
pub mod error;
pub mod fallback;
pub mod handlers;
pub mod routes;
pub mod sse;
pub mod state;

// Re-export primary types
pub use bootstrap::{CorsConfig, GatewayConfig, GatewayContext, bootstrap, serve_gateway, start_server};
pub use error::HttpError;
pub use routes::create_router;
pub use state::AppState;
