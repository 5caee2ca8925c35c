//! Prediction service integration tests
//!
//! Drives the router the way a client would, against artifacts written to disk.

#[allow(dead_code)]
mod common;

use axum::http::StatusCode;
use common::*;
use modelgate::serving;
use modelgate::ReadinessState;
use std::sync::Arc;

fn ready_env(version: Option<&str>) -> TestEnv {
    let env = TestEnv::new();
    env.write_model(&spam_model_bytes());
    if let Some(version) = version {
        env.write_version(version);
    }
    env
}

// =============================================================================
// Readiness
// =============================================================================

#[tokio::test]
async fn test_health_reports_version() {
    let env = ready_env(Some("v3\n"));
    let app = serving::router(Arc::new(env.gate()));

    let response = send(&app, get("/health")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.json(),
        serde_json::json!({"status": "ok", "model_version": "v3"})
    );
}

#[tokio::test]
async fn test_health_without_version_marker() {
    let env = ready_env(None);
    let app = serving::router(Arc::new(env.gate()));

    let response = send(&app, get("/health")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["model_version"], serde_json::Value::Null);
}

#[tokio::test]
async fn test_blank_version_marker_is_absent() {
    let env = ready_env(Some("  \n"));
    let gate = env.gate();
    assert!(gate.state().is_ready());
    assert_eq!(gate.health().unwrap().model_version, None);
}

#[tokio::test]
async fn test_head_health_has_empty_body() {
    let env = ready_env(Some("v3"));
    let app = serving::router(Arc::new(env.gate()));

    let response = send(&app, head("/health")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn test_missing_artifact_is_unavailable() {
    let env = TestEnv::new();
    let gate = env.gate();
    assert!(matches!(gate.state(), ReadinessState::Failed));

    let app = serving::router(Arc::new(gate));

    let health = send(&app, get("/health")).await;
    assert_eq!(health.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health.json()["detail"], "Model not loaded in image");

    let head = send(&app, head("/health")).await;
    assert_eq!(head.status, StatusCode::SERVICE_UNAVAILABLE);

    let predict = send(&app, post_json("/predict", r#"{"subject":"hi"}"#)).await;
    assert_eq!(predict.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(predict.json()["detail"], "Model not loaded in image");
}

#[tokio::test]
async fn test_corrupt_artifact_is_unavailable() {
    let env = TestEnv::new();
    env.write_model(b"not a model");
    env.write_version("v9");

    let app = serving::router(Arc::new(env.gate()));
    let response = send(&app, get("/health")).await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_failed_state_is_stable() {
    let env = TestEnv::new();
    let app = serving::router(Arc::new(env.gate()));

    // A model appearing after startup is not picked up.
    env.write_model(&spam_model_bytes());
    for _ in 0..3 {
        let response = send(&app, get("/health")).await;
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    }
}

// =============================================================================
// Prediction
// =============================================================================

#[tokio::test]
async fn test_predict_spam_and_ham() {
    let env = ready_env(Some("v3"));
    let app = serving::router(Arc::new(env.gate()));

    let spam = send(
        &app,
        post_json("/predict", r#"{"subject":"WIN free money","message":"click now"}"#),
    )
    .await;
    assert_eq!(spam.status, StatusCode::OK);
    let body = spam.json();
    assert_eq!(body["label"], "1");
    assert_eq!(body["model_version"], "v3");
    let score = body["score"].as_f64().unwrap();
    assert!((0.5..=1.0).contains(&score));

    let ham = send(
        &app,
        post_json("/predict", r#"{"subject":"Meeting agenda","message":"report before lunch"}"#),
    )
    .await;
    assert_eq!(ham.json()["label"], "0");
}

#[tokio::test]
async fn test_predict_is_deterministic() {
    let env = ready_env(None);
    let app = serving::router(Arc::new(env.gate()));
    let body = r#"{"subject":"free lunch","message":"meeting"}"#;

    let first = send(&app, post_json("/predict", body)).await.json();
    let second = send(&app, post_json("/predict", body)).await.json();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_linear_model_has_null_score() {
    let env = TestEnv::new();
    env.write_model(&linear_model().encode().unwrap());
    let app = serving::router(Arc::new(env.gate()));

    let response = send(&app, post_json("/predict", r#"{"subject":"win free"}"#)).await;
    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["label"], "1");
    assert!(body["score"].is_null());
    assert!(body["model_version"].is_null());
}

#[tokio::test]
async fn test_empty_object_is_accepted() {
    let env = ready_env(None);
    let app = serving::router(Arc::new(env.gate()));

    let response = send(&app, post_json("/predict", "{}")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.json()["label"].is_string());
}

#[tokio::test]
async fn test_wrong_field_type_is_rejected() {
    let env = ready_env(None);
    let app = serving::router(Arc::new(env.gate()));

    let response = send(&app, post_json("/predict", r#"{"subject": 42}"#)).await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.json()["detail"].is_string());
}

#[tokio::test]
async fn test_invalid_json_is_rejected() {
    let env = ready_env(None);
    let app = serving::router(Arc::new(env.gate()));

    let response = send(&app, post_json("/predict", "{not json")).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_predict_requires_post() {
    let env = ready_env(None);
    let app = serving::router(Arc::new(env.gate()));

    let response = send(&app, get("/predict")).await;
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_metrics_route_absent_without_handle() {
    let env = ready_env(None);
    let app = serving::router(Arc::new(env.gate()));

    let response = send(&app, get("/metrics")).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Evaluation contract
// =============================================================================

#[tokio::test]
async fn test_predicted_label_round_trips_to_binary() {
    let env = ready_env(None);
    let app = serving::router(Arc::new(env.gate()));

    let response = send(&app, post_json("/predict", r#"{"subject":"win money"}"#)).await;
    let label = modelgate::contract::parse_predicted_label(&response.json()).unwrap();
    assert_eq!(label, 1);
}
