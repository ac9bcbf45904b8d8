//! Adapter for a backend already running at a known address.

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use runway_core::domain::{BackendKind, ChatRequest, ChatResponse};
use runway_core::ports::{BackendAdapter, BackendError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::http::HttpBackend;

/// Remote backends select models per request, so load/unload only record
/// the model id.
#[derive(Debug)]
pub struct RemoteAdapter {
    name: String,
    http: HttpBackend,
    default_model: Option<String>,
    current_model: RwLock<Option<String>>,
}

impl RemoteAdapter {
    pub const fn new(name: String, http: HttpBackend, default_model: Option<String>) -> Self {
        Self {
            name,
            http,
            default_model,
            current_model: RwLock::new(None),
        }
    }

    fn model_for_request(&self) -> Option<String> {
        self.current_model().or_else(|| self.default_model.clone())
    }
}

#[async_trait]
impl BackendAdapter for RemoteAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BackendKind {
        BackendKind::RemoteHttp
    }

    fn base_url(&self) -> &str {
        self.http.base_url()
    }

    fn current_model(&self) -> Option<String> {
        self.current_model
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn health(&self) -> bool {
        self.http.probe().await
    }

    async fn chat(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<ChatResponse, BackendError> {
        self.http
            .chat(request, self.model_for_request(), cancel)
            .await
    }

    async fn load_model(&self, model: &str) -> Result<(), BackendError> {
        debug!(runner = %self.name, model = %model, "Selecting model");
        *self
            .current_model
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(model.to_string());
        Ok(())
    }

    async fn unload(&self) -> Result<bool, BackendError> {
        Ok(self
            .current_model
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some())
    }
}
