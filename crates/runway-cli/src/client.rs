//! Minimal HTTP client for a running gateway.

use reqwest::{Client, Response};
use runway_core::domain::{ChatRequest, ChatResponse, RegistryStatus, RunnerDescriptor};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayClientError {
    #[error("Cannot reach gateway at {url}: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("Gateway returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid gateway response: {0}")]
    InvalidResponse(String),
}

/// Runner list as returned by `GET /v1/runners`.
#[derive(Debug, serde::Deserialize)]
pub struct RunnerList {
    pub active: Option<String>,
    pub runners: Vec<RunnerDescriptor>,
}

#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: Client,
    base_url: String,
}

impl GatewayClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn status(&self) -> Result<RegistryStatus, GatewayClientError> {
        let url = self.url("/status");
        let response = self.client.get(&url).send().await;
        decode(&url, response).await
    }

    pub async fn runners(&self) -> Result<RunnerList, GatewayClientError> {
        let url = self.url("/v1/runners");
        let response = self.client.get(&url).send().await;
        decode(&url, response).await
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, GatewayClientError> {
        let url = self.url("/v1/chat/completions");
        let response = self.client.post(&url).json(request).send().await;
        decode(&url, response).await
    }
}

async fn decode<T: serde::de::DeserializeOwned>(
    url: &str,
    response: reqwest::Result<Response>,
) -> Result<T, GatewayClientError> {
    let response = response.map_err(|e| GatewayClientError::Unreachable {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| GatewayClientError::InvalidResponse(e.to_string()))?;

    if !status.is_success() {
        return Err(GatewayClientError::Api {
            status: status.as_u16(),
            message: error_message(&bytes),
        });
    }
    serde_json::from_slice(&bytes).map_err(|e| GatewayClientError::InvalidResponse(e.to_string()))
}

/// The `error` field of a gateway error body, else the raw body.
fn error_message(body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned())
}
