//! HTTP plumbing shared by every adapter variant.

use std::time::Duration;

use reqwest::Client;
use runway_core::domain::{ChatRequest, ChatResponse};
use runway_core::ports::BackendError;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::health;

/// Chat endpoint relative to a backend's base URL.
pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

/// Parse and normalize a base URL: http(s) only, no trailing slash.
pub fn normalize_base_url(raw: &str) -> Result<String, String> {
    let url = Url::parse(raw.trim()).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported scheme '{other}'")),
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Client bound to one backend address.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    probe_timeout: Duration,
}

impl HttpBackend {
    pub const fn new(client: Client, base_url: String, probe_timeout: Duration) -> Self {
        Self {
            client,
            base_url,
            probe_timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn probe(&self) -> bool {
        health::probe(&self.client, &self.base_url, self.probe_timeout).await
    }

    /// POST `request` to the chat endpoint.
    ///
    /// `fallback_model` fills a missing `model` field. Cancellation aborts
    /// the in-flight request.
    pub async fn chat(
        &self,
        mut request: ChatRequest,
        fallback_model: Option<String>,
        cancel: CancellationToken,
    ) -> Result<ChatResponse, BackendError> {
        if request.model.is_none() {
            request.model = fallback_model;
        }
        let url = format!("{}{CHAT_COMPLETIONS_PATH}", self.base_url);
        debug!(url = %url, model = ?request.model, "Forwarding chat request");

        let exchange = async {
            let response = self
                .client
                .post(&url)
                .json(&request)
                .send()
                .await
                .map_err(map_transport_error)?;

            let status = response.status();
            let body = response.bytes().await.map_err(map_transport_error)?;

            if !status.is_success() {
                return Err(BackendError::Status {
                    status: status.as_u16(),
                    body: String::from_utf8_lossy(&body).into_owned(),
                });
            }

            serde_json::from_slice::<ChatResponse>(&body)
                .map_err(|e| BackendError::InvalidResponse(e.to_string()))
        };

        tokio::select! {
            () = cancel.cancelled() => {
                debug!(url = %url, "Chat request cancelled");
                Err(BackendError::Cancelled)
            }
            result = exchange => result,
        }
    }
}

fn map_transport_error(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout
    } else if e.is_decode() || e.is_body() {
        BackendError::InvalidResponse(e.to_string())
    } else {
        BackendError::Unreachable(e.to_string())
    }
}
