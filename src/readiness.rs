//! Readiness gate for the prediction service.
//!
//! The gate performs exactly one load attempt at process start. Afterwards its state
//! is immutable and every health or prediction request only reads it, so it can be
//! shared behind an `Arc` without locking. A process whose load failed stays
//! unavailable until it is restarted.

use crate::artifact::ArtifactStore;
use crate::error::{GateError, Result};
use crate::model::{ModelArtifact, SavedModel};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

/// Message returned to callers while no model is loaded.
pub const NOT_LOADED_MESSAGE: &str = "Model not loaded in image";

/// Load state of the serving process.
#[derive(Debug, Clone)]
pub enum ReadinessState {
    /// Before the load attempt.
    Unloaded,
    /// A model is loaded and may serve requests.
    Ready(ModelArtifact),
    /// The load attempt failed. The cause was logged, not kept.
    Failed,
}

impl ReadinessState {
    /// Short name for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            ReadinessState::Unloaded => "unloaded",
            ReadinessState::Ready(_) => "ready",
            ReadinessState::Failed => "failed",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ReadinessState::Ready(_))
    }
}

/// Health payload for a ready service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub model_version: Option<String>,
}

/// Owns the one-time load attempt and answers readiness queries.
#[derive(Debug)]
pub struct ReadinessGate {
    state: ReadinessState,
}

impl ReadinessGate {
    /// A gate that has not attempted a load.
    pub fn unloaded() -> Self {
        Self {
            state: ReadinessState::Unloaded,
        }
    }

    /// A gate already holding `artifact`.
    pub fn ready(artifact: ModelArtifact) -> Self {
        Self {
            state: ReadinessState::Ready(artifact),
        }
    }

    /// Attempts the load once and logs the outcome once.
    pub fn initialize(store: &dyn ArtifactStore) -> Self {
        let state = match load_artifact(store) {
            Ok(artifact) => {
                info!(
                    path = %store.location(),
                    version = artifact.version().unwrap_or("none"),
                    "Model loaded successfully"
                );
                ReadinessState::Ready(artifact)
            }
            Err(e) => {
                error!(path = %store.location(), error = %e, "Failed to load model at startup");
                ReadinessState::Failed
            }
        };

        crate::observability::record_readiness(state.is_ready());
        Self { state }
    }

    /// Current state.
    pub fn state(&self) -> &ReadinessState {
        &self.state
    }

    /// The loaded artifact, or [`GateError::ServiceUnavailable`].
    pub fn require_ready(&self) -> Result<&ModelArtifact> {
        match &self.state {
            ReadinessState::Ready(artifact) => Ok(artifact),
            ReadinessState::Unloaded | ReadinessState::Failed => {
                Err(GateError::ServiceUnavailable(NOT_LOADED_MESSAGE.to_string()))
            }
        }
    }

    /// Health payload, or [`GateError::ServiceUnavailable`].
    pub fn health(&self) -> Result<HealthReport> {
        let artifact = self.require_ready()?;
        Ok(HealthReport {
            status: "ok",
            model_version: artifact.version().map(str::to_string),
        })
    }
}

/// Reads and decodes the artifact, then attaches the optional version tag.
pub fn load_artifact(store: &dyn ArtifactStore) -> Result<ModelArtifact> {
    let bytes = store.read_model()?;
    let model = SavedModel::decode(&bytes)?;
    let version = store.read_version();
    Ok(ModelArtifact::new(Arc::new(model)).with_version(version))
}
