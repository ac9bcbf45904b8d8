//! Router fixtures backed by stub runners.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use runway_core::ports::BackendAdapter;
use runway_runtime::testing::StubAdapter;
use runway_runtime::{RegistryOptions, RunnerRegistry};
use runway_axum::{CorsConfig, GatewayContext, create_router};
use serde_json::Value;
use tower::ServiceExt;

pub struct Gateway {
    pub router: Router,
    pub registry: Arc<RunnerRegistry>,
}

/// A gateway over `stubs`, with the first healthy one selected.
pub async fn gateway(stubs: &[&Arc<StubAdapter>], allow_fallback: bool) -> Gateway {
    let registry = Arc::new(RunnerRegistry::new(RegistryOptions::default()));
    for stub in stubs {
        registry
            .register_adapter(Arc::clone(stub) as Arc<dyn BackendAdapter>)
            .await;
    }
    let _ = registry.select_default().await;

    let ctx = Arc::new(GatewayContext::new(Arc::clone(&registry), allow_fallback));
    Gateway {
        router: create_router(ctx, &CorsConfig::AllowAll),
        registry,
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}
