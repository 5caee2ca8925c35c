//! Common test utilities for integration tests.

pub mod fake_registry;
pub mod fixtures;
pub mod mock_tracking;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use modelgate::artifact::FsArtifactStore;
use modelgate::ReadinessGate;
use std::path::PathBuf;
use tempfile::TempDir;
use tower::ServiceExt;

// Re-export common types
pub use fake_registry::*;
pub use fixtures::*;
pub use mock_tracking::*;

/// Test environment with a private artifact directory.
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub model_dir: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let model_dir = temp_dir.path().join("model");
        std::fs::create_dir_all(&model_dir).expect("Failed to create model dir");

        Self {
            temp_dir,
            model_dir,
        }
    }

    pub fn model_path(&self) -> PathBuf {
        self.model_dir.join("model.bin")
    }

    pub fn version_path(&self) -> PathBuf {
        self.model_dir.join("VERSION")
    }

    /// Writes an encoded artifact into the model directory.
    pub fn write_model(&self, bytes: &[u8]) {
        std::fs::write(self.model_path(), bytes).expect("Failed to write model");
    }

    pub fn write_version(&self, version: &str) {
        std::fs::write(self.version_path(), version).expect("Failed to write version");
    }

    pub fn store(&self) -> FsArtifactStore {
        FsArtifactStore::new(self.model_path(), self.version_path())
    }

    /// Runs the startup load against this environment.
    pub fn gate(&self) -> ReadinessGate {
        ReadinessGate::initialize(&self.store())
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Response captured from a router.
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("response body is JSON")
    }
}

/// Sends one request through `app` without binding a socket.
pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes()
        .to_vec();
    TestResponse { status, body }
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

pub fn head(uri: &str) -> Request<Body> {
    Request::head(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}
