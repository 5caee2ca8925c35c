//! Observability module for modelgate.
//!
//! Provides logging and metrics. Metrics are recorded through the `metrics` facade and
//! are no-ops until a recorder is installed with [`install_prometheus`].

use crate::config::ObservabilityConfig;
use crate::error::{GateError, Result};
use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use ::tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging.
pub fn init(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| GateError::Internal(format!("Failed to init logging: {}", e)))?;
    } else {
        subscriber
            .with(fmt::layer())
            .try_init()
            .map_err(|e| GateError::Internal(format!("Failed to init logging: {}", e)))?;
    }

    info!("Observability initialized");
    Ok(())
}

/// Install the global Prometheus recorder and return a render handle.
pub fn install_prometheus() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| GateError::Internal(format!("Failed to install metrics recorder: {}", e)))?;

    register_metrics();
    Ok(handle)
}

/// Register standard metrics so they render before the first event.
fn register_metrics() {
    gauge!("modelgate_model_ready").set(0.0);
    counter!("modelgate_predictions_total").absolute(0);
    counter!("modelgate_prediction_errors_total").absolute(0);
    counter!("modelgate_promotions_total").absolute(0);
    counter!("modelgate_promotion_failures_total").absolute(0);
}

/// Record the outcome of the startup load.
pub fn record_readiness(ready: bool) {
    gauge!("modelgate_model_ready").set(if ready { 1.0 } else { 0.0 });
}

/// Record a served prediction.
pub fn record_prediction(label: &str, scored: bool) {
    counter!(
        "modelgate_predictions_total",
        "label" => label.to_string(),
        "scored" => scored.to_string()
    )
    .increment(1);
}

/// Record a failed prediction.
pub fn record_prediction_error(status: u16) {
    counter!("modelgate_prediction_errors_total", "status" => status.to_string()).increment(1);
}

/// Record a promotion attempt.
pub fn record_promotion(success: bool) {
    if success {
        counter!("modelgate_promotions_total").increment(1);
    } else {
        counter!("modelgate_promotion_failures_total").increment(1);
    }
}
