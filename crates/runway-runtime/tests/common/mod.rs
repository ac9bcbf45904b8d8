//! Fake OpenAI-compatible backends for registry integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

/// A backend on an ephemeral port whose health can be toggled.
#[derive(Clone)]
pub struct FakeBackend {
    pub addr: SocketAddr,
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    healthy: AtomicBool,
    chats: AtomicUsize,
}

impl FakeBackend {
    pub async fn spawn(name: &str, healthy: bool) -> Self {
        let inner = Arc::new(Inner {
            name: name.to_string(),
            healthy: AtomicBool::new(healthy),
            chats: AtomicUsize::new(0),
        });
        let router = Router::new()
            .route("/health", get(health))
            .route("/v1/models", get(health))
            .route("/v1/chat/completions", post(chat))
            .with_state(Arc::clone(&inner));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Self { addr, inner }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.inner.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn chats(&self) -> usize {
        self.inner.chats.load(Ordering::SeqCst)
    }
}

async fn health(State(inner): State<Arc<Inner>>) -> StatusCode {
    if inner.healthy.load(Ordering::SeqCst) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn chat(State(inner): State<Arc<Inner>>, Json(body): Json<Value>) -> Json<Value> {
    inner.chats.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "id": "cmpl-fake",
        "object": "chat.completion",
        "created": 0,
        "model": body["model"].as_str().unwrap_or("fake"),
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": format!("from {}", inner.name)},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2}
    }))
}

/// A loopback port nothing listens on.
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}
