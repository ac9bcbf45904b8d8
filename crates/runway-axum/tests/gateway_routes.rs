//! Route-level tests for the gateway.
//!
//! These verify that routes are wired to the registry and that registry
//! errors surface with the right status codes.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use http_body_util::BodyExt;
use runway_core::ports::BackendAdapter;
use runway_runtime::testing::StubAdapter;
use serde_json::json;
use tower::ServiceExt;

use common::{delete, gateway, get, post_json, send};

fn chat_body(text: &str) -> serde_json::Value {
    json!({"messages": [{"role": "user", "content": text}], "temperature": 0.1})
}

#[tokio::test]
async fn health_is_plain_ok_even_when_degraded() {
    let gw = gateway(&[], false).await;
    let response = gw.router.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"OK");
}

#[tokio::test]
async fn status_reports_active_runner() {
    let a = Arc::new(StubAdapter::healthy("a"));
    let b = Arc::new(StubAdapter::healthy("b"));
    let gw = gateway(&[&a, &b], false).await;

    let (status, body) = send(&gw.router, get("/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], "a");
    assert_eq!(body["healthy"], true);
    assert_eq!(body["baseUrl"], "http://a.invalid");
    assert_eq!(body["runners"], json!(["a", "b"]));
}

#[tokio::test]
async fn chat_is_forwarded_to_active_runner() {
    let a = Arc::new(StubAdapter::healthy("a"));
    let gw = gateway(&[&a], false).await;

    let (status, body) = send(&gw.router, post_json("/v1/chat/completions", &chat_body("hi"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["choices"][0]["message"]["content"], "a: hi");
    assert_eq!(body["choices"][0]["finish_reason"], "stop");
    assert_eq!(a.chat_calls(), 1);
}

#[tokio::test]
async fn negative_sampling_values_reach_the_runner() {
    let a = Arc::new(StubAdapter::healthy("a"));
    let gw = gateway(&[&a], false).await;

    let body = json!({
        "messages": [{"role": "user", "content": "hi"}],
        "top_k": -1,
        "max_tokens": -1
    });
    let (status, _) = send(&gw.router, post_json("/v1/chat/completions", &body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(a.chat_calls(), 1);
}

#[tokio::test]
async fn degraded_chat_is_503() {
    let a = Arc::new(StubAdapter::unhealthy("a"));
    let gw = gateway(&[&a], false).await;

    let (status, body) = send(&gw.router, post_json("/v1/chat/completions", &chat_body("hi"))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["type"], "no_backend_available");
    assert_eq!(a.chat_calls(), 0);
}

#[tokio::test]
async fn degraded_chat_with_fallback_answers() {
    let gw = gateway(&[], true).await;

    let (status, body) = send(&gw.router, post_json("/v1/chat/completions", &chat_body("ping"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["choices"][0]["message"]["content"], "pong");

    let (_, body) = send(&gw.router, post_json("/v1/chat/completions", &chat_body("echo me"))).await;
    assert_eq!(body["choices"][0]["message"]["content"], "echo me");
}

#[tokio::test]
async fn fallback_does_not_mask_backend_errors() {
    let a = Arc::new(StubAdapter::healthy("a"));
    a.fail_with(500, "model exploded");
    let gw = gateway(&[&a], true).await;

    let (status, body) = send(&gw.router, post_json("/v1/chat/completions", &chat_body("hi"))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["type"], "backend_error");
    assert_eq!(body["metadata"]["upstreamStatus"], 500);
    assert_eq!(body["metadata"]["upstreamBody"], "model exploded");
}

#[tokio::test]
async fn streaming_and_malformed_requests_are_400() {
    let a = Arc::new(StubAdapter::healthy("a"));
    let gw = gateway(&[&a], false).await;

    let streaming = json!({"messages": [{"role": "user", "content": "hi"}], "stream": true});
    let (status, _) = send(&gw.router, post_json("/v1/chat/completions", &streaming)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&gw.router, post_json("/v1/chat/completions", &json!({"model": 3}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["type"], "invalid_request");
    assert_eq!(a.chat_calls(), 0);
}

#[tokio::test]
async fn runners_lists_descriptors() {
    let a = Arc::new(StubAdapter::healthy("a"));
    let local = Arc::new(StubAdapter::healthy("local").with_process());
    let gw = gateway(&[&a, &local], false).await;

    let (status, body) = send(&gw.router, get("/v1/runners")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], "a");
    assert_eq!(body["runners"][1]["name"], "local");
    assert_eq!(body["runners"][1]["kind"], "local-process");
    assert_eq!(body["runners"][1]["active"], false);
}

#[tokio::test]
async fn switch_by_name() {
    let a = Arc::new(StubAdapter::healthy("a"));
    let b = Arc::new(StubAdapter::healthy("b"));
    let gw = gateway(&[&a, &b], false).await;

    let (status, body) = send(&gw.router, post_json("/v1/runners/switch", &json!({"name": "b"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], "b");
}

#[tokio::test]
async fn switch_by_name_with_model_loads_into_target() {
    let a = Arc::new(StubAdapter::healthy("a"));
    let b = Arc::new(StubAdapter::healthy("b"));
    let gw = gateway(&[&a, &b], false).await;

    let (status, body) = send(
        &gw.router,
        post_json("/v1/runners/switch", &json!({"name": "b", "model": "qwen"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], "b");
    assert_eq!(body["currentModel"], "qwen");
    assert_eq!(a.current_model(), None);
}

#[tokio::test]
async fn failed_switch_keeps_active_runner() {
    let a = Arc::new(StubAdapter::healthy("a"));
    let b = Arc::new(StubAdapter::unhealthy("b"));
    let gw = gateway(&[&a, &b], false).await;

    let (status, body) = send(&gw.router, post_json("/v1/runners/switch", &json!({"name": "b"}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["type"], "runner_unhealthy");

    let (status, _) =
        send(&gw.router, post_json("/v1/runners/switch", &json!({"name": "nonexistent"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&gw.router, post_json("/v1/runners/switch", &json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &gw.router,
        post_json(
            "/v1/runners/switch",
            &json!({"type": "carrier-pigeon", "baseUrl": "http://127.0.0.1:1"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(gw.registry.status().active.as_deref(), Some("a"));
}

#[tokio::test]
async fn switch_by_endpoint_reuses_registered_runner() {
    let a = Arc::new(StubAdapter::healthy("a"));
    let b = Arc::new(StubAdapter::healthy("b").with_base_url("http://10.1.2.3:8080"));
    let gw = gateway(&[&a, &b], false).await;

    let (status, body) = send(
        &gw.router,
        post_json(
            "/v1/runners/switch",
            &json!({"type": "remote-http", "baseUrl": "http://10.1.2.3:8080", "model": "qwen"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], "b");
    assert_eq!(body["currentModel"], "qwen");
}

#[tokio::test]
async fn load_and_unload_model() {
    let a = Arc::new(StubAdapter::healthy("a"));
    let gw = gateway(&[&a], false).await;

    let (status, body) =
        send(&gw.router, post_json("/v1/models/load", &json!({"path": "/models/qwen.gguf"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["currentModel"], "/models/qwen.gguf");

    let (status, body) = send(&gw.router, delete("/v1/models/load")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["unloaded"], true);

    let (_, body) = send(&gw.router, delete("/v1/models/load")).await;
    assert_eq!(body["unloaded"], false);
}

#[tokio::test]
async fn load_without_active_runner_is_503() {
    let gw = gateway(&[], false).await;
    let (status, _) = send(&gw.router, post_json("/v1/models/load", &json!({"path": "m"}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn logs_route() {
    let local = Arc::new(StubAdapter::healthy("local").with_process());
    let gw = gateway(&[&local], false).await;

    let (status, body) = send(&gw.router, get("/v1/runners/local/logs")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));
    assert_eq!(body[0]["stream"], "stderr");

    let (status, _) = send(&gw.router, get("/v1/runners/missing/logs")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn events_route_is_an_sse_stream() {
    let gw = gateway(&[], false).await;
    let response = gw.router.clone().oneshot(get("/v1/events")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "text/event-stream"
    );
}
