//! Integration tests for the engine API endpoints

use aura_core::{
    health::{components, HealthRegistry},
    observability::EngineMetrics,
    PreflightReport,
};
use aura_engine::api::{create_router, AppState};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use std::sync::Arc;
use tower::ServiceExt;

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    health_registry.register(components::ARTIFACT_STORE).await;
    health_registry.register(components::FORECASTER).await;
    health_registry.register(components::RECOMMENDER).await;

    let metrics = EngineMetrics::new();
    let state = Arc::new(AppState::new(health_registry, metrics));
    let router = create_router(state.clone());

    (router, state)
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(health["status"], "healthy");
}

#[tokio::test]
async fn test_healthz_returns_ok_when_degraded() {
    let (app, state) = setup_test_app().await;

    // No policy artifact: dosing unavailable, forecasting still served
    state
        .health_registry
        .apply_preflight(&PreflightReport {
            forecaster_ready: true,
            policy_ready: false,
            forecaster_error: None,
            policy_error: Some("Policy model not found".to_string()),
        })
        .await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // Degraded still returns 200 (operational)
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(health["status"], "degraded");
    assert_eq!(
        health["components"]["recommender"]["message"],
        "Policy model not found"
    );
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, state) = setup_test_app().await;

    // Default forecasting pair missing
    state
        .health_registry
        .set_unhealthy(components::FORECASTER, "Default model is missing or corrupted")
        .await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_returns_503_when_not_ready() {
    let (app, _state) = setup_test_app().await;

    // By default, the engine is not ready
    let response = app
        .oneshot(
            Request::builder()
                .uri("/readyz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(readiness["ready"], false);
}

#[tokio::test]
async fn test_readyz_returns_ok_when_ready() {
    let (app, state) = setup_test_app().await;

    // Mark as ready
    state.health_registry.set_ready(true).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/readyz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_readyz_returns_503_when_ready_but_unhealthy() {
    let (app, state) = setup_test_app().await;

    // Mark as ready but set component unhealthy
    state.health_registry.set_ready(true).await;
    state
        .health_registry
        .set_unhealthy(components::ARTIFACT_STORE, "Failed")
        .await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/readyz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, state) = setup_test_app().await;

    // Record some metrics
    state.metrics.observe_forecast_latency(0.001);
    state.metrics.observe_dose_latency(0.002);
    state.metrics.inc_forecasts("success");
    state.metrics.inc_resolver_fallbacks();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    // Verify expected metrics are present
    assert!(metrics_text.contains("aura_engine_forecast_latency_seconds"));
    assert!(metrics_text.contains("aura_engine_dose_latency_seconds"));
    assert!(metrics_text.contains("aura_engine_forecasts_total"));
    assert!(metrics_text.contains("aura_engine_resolver_fallbacks_total"));
}

#[tokio::test]
async fn test_metrics_contains_histogram_buckets() {
    let (app, state) = setup_test_app().await;

    // Record some latency observations
    state.metrics.observe_forecast_latency(0.001);
    state.metrics.observe_forecast_latency(0.005);
    state.metrics.observe_forecast_latency(0.01);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    // Verify histogram has bucket labels
    assert!(metrics_text.contains("aura_engine_forecast_latency_seconds_bucket"));
    assert!(metrics_text.contains("aura_engine_forecast_latency_seconds_count"));
    assert!(metrics_text.contains("aura_engine_forecast_latency_seconds_sum"));
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (app, _state) = setup_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/forecast")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_healthz_includes_component_details() {
    let (app, _state) = setup_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();

    // Verify components are included
    assert!(health["components"].is_object());
    assert!(health["components"]["forecaster"].is_object());
    assert!(health["components"]["recommender"].is_object());
    assert!(health["components"]["artifact_store"].is_object());
}
