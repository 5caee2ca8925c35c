// Prediction service: request schema, handler logic and HTTP routes

use crate::error::{GateError, Result};
use crate::readiness::ReadinessGate;
use crate::shutdown::ShutdownCoordinator;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    routing::post,
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// Prediction request. Every field defaults to the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictRequest {
    /// Email subject line
    pub subject: String,
    /// Recipient address
    pub email_to: String,
    /// Sender address
    pub email_from: String,
    /// Message body
    pub message: String,
}

impl PredictRequest {
    /// Classifier input: subject and body joined by one space.
    ///
    /// `email_to` and `email_from` are accepted but do not contribute.
    pub fn feature_text(&self) -> String {
        format!("{} {}", self.subject, self.message)
    }
}

/// Prediction response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    /// Predicted class label
    pub label: String,
    /// Maximum class probability, when the model can produce one
    pub score: Option<f64>,
    /// Version of the loaded model
    pub model_version: Option<String>,
}

/// Runs one prediction against the gate's loaded model.
pub fn predict(gate: &ReadinessGate, request: &PredictRequest) -> Result<PredictResponse> {
    let artifact = gate.require_ready()?;
    let text = request.feature_text();

    let label = artifact.predict(&text)?;
    let score = artifact.confidence(&text)?;

    Ok(PredictResponse {
        label,
        score,
        model_version: artifact.version().map(str::to_string),
    })
}

/// Shared handler state. Immutable after construction.
#[derive(Clone)]
pub struct AppState {
    gate: Arc<ReadinessGate>,
    metrics: Option<PrometheusHandle>,
}

/// Routes without a metrics endpoint.
pub fn router(gate: Arc<ReadinessGate>) -> Router {
    router_with_metrics(gate, None)
}

/// Routes, plus `/metrics` when a Prometheus handle is supplied.
pub fn router_with_metrics(gate: Arc<ReadinessGate>, metrics: Option<PrometheusHandle>) -> Router {
    let expose_metrics = metrics.is_some();
    let state = AppState { gate, metrics };

    let app = Router::new()
        .route("/health", get(health).head(health_head))
        .route("/predict", post(handle_predict));

    let app = if expose_metrics {
        app.route("/metrics", get(render_metrics))
    } else {
        app
    };

    app.with_state(state)
}

/// Serve `app` on `listener` until the coordinator signals shutdown.
pub async fn serve(listener: TcpListener, app: Router, shutdown: ShutdownCoordinator) -> Result<()> {
    let addr = listener.local_addr()?;
    info!(addr = %addr, "Prediction server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.wait_for_shutdown().await })
        .await
        .map_err(|e| GateError::Network(e.to_string()))?;

    info!("Prediction server stopped");
    Ok(())
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

fn error_response(status: StatusCode, detail: String) -> Response {
    (status, Json(ErrorBody { detail })).into_response()
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        error_response(status, self.to_string())
    }
}

// Handlers

async fn health(State(state): State<AppState>) -> Result<Json<crate::readiness::HealthReport>> {
    Ok(Json(state.gate.health()?))
}

async fn health_head(State(state): State<AppState>) -> Result<StatusCode> {
    state.gate.require_ready()?;
    Ok(StatusCode::OK)
}

async fn handle_predict(
    State(state): State<AppState>,
    payload: std::result::Result<Json<PredictRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(request) => request,
        Err(rejection) => {
            let status = rejection.status();
            debug!(status = status.as_u16(), "Rejected predict payload");
            crate::observability::record_prediction_error(status.as_u16());
            return error_response(status, rejection.body_text());
        }
    };

    match predict(&state.gate, &request) {
        Ok(response) => {
            crate::observability::record_prediction(&response.label, response.score.is_some());
            Json(response).into_response()
        }
        Err(e) => {
            if !matches!(e, GateError::ServiceUnavailable(_)) {
                warn!(error = %e, "Prediction failed");
            }
            crate::observability::record_prediction_error(e.status_code());
            e.into_response()
        }
    }
}

async fn render_metrics(State(state): State<AppState>) -> Response {
    match state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
