//! Integration tests for health check endpoints
//!
//! Tests the health check API routes to ensure proper responses
//! for liveness and readiness probes.

mod common;

use axum::{body::Body, http::Request, http::StatusCode, Router};
use playhead_api::routes::{health_router, HealthState};
use playhead_api::services::HealthService;
use playhead_test_utils::MockLlmServer;
use tower::ServiceExt;

fn create_test_app(service: HealthService) -> Router {
    Router::new().nest("/health", health_router(HealthState::new(service)))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn test_simple_health_check() {
    let (status, body) = get(create_test_app(HealthService::default()), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"OK");
}

#[tokio::test]
async fn test_liveness_probe() {
    let (status, body) = get(create_test_app(HealthService::default()), "/health/live").await;

    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "alive");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_readiness_with_nothing_configured() {
    let (status, body) = get(create_test_app(HealthService::default()), "/health/ready").await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["services"].is_array());
}

#[tokio::test]
async fn test_readiness_with_reachable_model_server() {
    let llm = MockLlmServer::start().await;
    llm.mock_models().await;
    let service = HealthService::new(None, Some(common::test_llm(&llm.url())));

    let (status, _) = get(create_test_app(service), "/health/ready").await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_readiness_with_unreachable_model_server() {
    // Nothing is mounted, so every request answers 404
    let llm = MockLlmServer::start().await;
    let service = HealthService::new(None, Some(common::test_llm(&llm.url())));

    let (status, body) = get(create_test_app(service), "/health/ready").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "unhealthy");
}
