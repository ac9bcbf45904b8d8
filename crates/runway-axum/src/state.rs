//! Shared application state type.

use std::sync::Arc;

use crate::bootstrap::GatewayContext;

/// Application state shared across all handlers.
pub type AppState = Arc<GatewayContext>;
