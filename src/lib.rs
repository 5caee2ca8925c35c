//! modelgate - readiness-gated text classification serving with metric-ranked model promotion.
//!
//! A serving process loads one model artifact at startup and answers predictions over
//! HTTP only while that artifact is loaded. A separate promotion pipeline picks the
//! best training run from an experiment-tracking server and publishes its model into
//! the layout the serving process reads.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          modelgate                            │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Serving:   axum router | /health | /predict | /metrics      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Readiness: ReadinessGate (Unloaded -> Ready | Failed)       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Artifact:  SavedModel codec | FsArtifactStore | VERSION     │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Promotion: RunRegistry (MLflow) | staging | atomic publish  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use modelgate::config::GateConfig;
//!
//! #[tokio::main]
//! async fn main() -> modelgate::Result<()> {
//!     let config = GateConfig::development();
//!     modelgate::serve(config).await
//! }
//! ```

pub mod config;
pub mod error;

pub mod artifact;
pub mod contract;
pub mod model;
pub mod promotion;
pub mod readiness;
pub mod registry;
pub mod serving;
pub mod shutdown;

pub mod cli;
pub mod observability;

// Re-exports
pub use error::{GateError, Result};
pub use model::{Classifier, ConfidenceScorer, ModelArtifact, SavedModel};
pub use promotion::{PromotionOutcome, PromotionRequest, RunSelection};
pub use readiness::{ReadinessGate, ReadinessState};

use artifact::FsArtifactStore;
use config::GateConfig;
use registry::MlflowClient;
use shutdown::{ShutdownCoordinator, SignalHandler};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Run the prediction server with the given configuration.
///
/// The artifact load completes before the listener is bound, so no request is
/// served ahead of it. A failed load leaves the server answering 503.
pub async fn serve(config: GateConfig) -> Result<()> {
    info!(
        model = %config.artifact.model_path.display(),
        bind = %config.server.bind_addr,
        "Starting modelgate"
    );

    let store = FsArtifactStore::from_config(&config.artifact);
    let gate = Arc::new(ReadinessGate::initialize(&store));

    let metrics = if config.server.metrics_enabled {
        match observability::install_prometheus() {
            Ok(handle) => {
                observability::record_readiness(gate.state().is_ready());
                Some(handle)
            }
            Err(e) => {
                warn!(error = %e, "Metrics disabled");
                None
            }
        }
    } else {
        None
    };

    let app = serving::router_with_metrics(gate, metrics);
    let listener = TcpListener::bind(config.server.bind_addr).await?;

    let coordinator = ShutdownCoordinator::new();
    let signal_coordinator = coordinator.clone();
    tokio::spawn(async move {
        SignalHandler::new(signal_coordinator).run().await;
    });

    serving::serve(listener, app, coordinator).await?;

    info!("modelgate shutdown complete");
    Ok(())
}

/// Promote a run against the tracking server named in `config`.
pub async fn promote(config: &GateConfig, selection: RunSelection) -> Result<PromotionOutcome> {
    let registry = MlflowClient::from_config(&config.registry)?;
    info!(tracking_uri = %registry.base_url(), "Using run registry");

    let mut request = PromotionRequest::new(selection, &config.promotion.out_path)
        .with_model_artifact_path(&config.promotion.model_artifact_path);
    request.max_results = config.promotion.max_results;

    promotion::promote(&registry, &request).await
}
