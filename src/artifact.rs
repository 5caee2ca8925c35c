//! Read-only access to the served model artifact.
//!
//! The promotion pipeline produces files in this layout and the serving process
//! consumes them; the two never talk to each other directly.

use crate::config::ArtifactConfig;
use crate::error::{GateError, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File written next to the artifact recording the last promoted run.
pub const PROVENANCE_FILE_NAME: &str = "PROMOTED_RUN";

/// File name a model is logged under inside a run's artifact tree.
pub const LOGGED_MODEL_FILE_NAME: &str = "model.bin";

/// Byte source for a serialized model and its optional version marker.
pub trait ArtifactStore: Send + Sync {
    /// Human-readable location, used in logs and errors.
    fn location(&self) -> String;

    /// Raw model bytes. Fails with [`GateError::ArtifactMissing`] when absent.
    fn read_model(&self) -> Result<Vec<u8>>;

    /// Version tag, if one is recorded and readable.
    fn read_version(&self) -> Option<String>;
}

/// Artifact store backed by two fixed filesystem paths.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    model_path: PathBuf,
    version_path: PathBuf,
}

impl FsArtifactStore {
    pub fn new(model_path: impl Into<PathBuf>, version_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            version_path: version_path.into(),
        }
    }

    pub fn from_config(config: &ArtifactConfig) -> Self {
        Self::new(&config.model_path, &config.version_path)
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}

impl ArtifactStore for FsArtifactStore {
    fn location(&self) -> String {
        self.model_path.display().to_string()
    }

    fn read_model(&self) -> Result<Vec<u8>> {
        if !self.model_path.is_file() {
            return Err(GateError::ArtifactMissing(self.location()));
        }
        Ok(std::fs::read(&self.model_path)?)
    }

    fn read_version(&self) -> Option<String> {
        match std::fs::read_to_string(&self.version_path) {
            Ok(raw) => normalize_version(&raw),
            Err(e) => {
                debug!(path = %self.version_path.display(), error = %e, "No version marker");
                None
            }
        }
    }
}

/// Trims a version marker; blank markers count as absent.
pub fn normalize_version(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Path of the provenance file for an artifact written to `artifact_path`.
pub fn provenance_path(artifact_path: &Path) -> PathBuf {
    artifact_path
        .parent()
        .map(|dir| dir.join(PROVENANCE_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(PROVENANCE_FILE_NAME))
}
