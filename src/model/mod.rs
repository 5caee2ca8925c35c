// Model capabilities and the on-disk artifact encoding

pub mod estimator;

pub use estimator::{Estimator, LinearModel, NaiveBayes, Tokenizer};

use crate::error::{GateError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Leading bytes of every encoded [`SavedModel`].
pub const SAVED_MODEL_MAGIC: [u8; 4] = *b"MGSM";

/// Current encoding revision.
pub const SAVED_MODEL_FORMAT: u32 = 1;

/// Mandatory capability: map a feature string to a label.
pub trait Classifier: Send + Sync {
    /// Predicts a label for one feature string.
    fn predict(&self, text: &str) -> Result<String>;

    /// Optional capability: probability estimates over the model's classes.
    fn confidence_scorer(&self) -> Option<&dyn ConfidenceScorer> {
        None
    }
}

/// Optional capability for classifiers that produce class probabilities.
pub trait ConfidenceScorer: Send + Sync {
    /// Probability per class, in class order.
    fn predict_proba(&self, text: &str) -> Result<Vec<f64>>;

    /// Maximum class probability, clamped to `[0, 1]`.
    fn confidence(&self, text: &str) -> Result<f64> {
        let proba = self.predict_proba(text)?;
        proba
            .into_iter()
            .filter(|p| p.is_finite())
            .fold(None, |best: Option<f64>, p| Some(best.map_or(p, |b| b.max(p))))
            .map(|p| p.clamp(0.0, 1.0))
            .ok_or_else(|| GateError::Inference("model returned no probabilities".to_string()))
    }
}

/// Serialized model as stored in the artifact store and the run registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedModel {
    magic: [u8; 4],
    format_version: u32,
    /// The wrapped estimator
    pub estimator: Estimator,
}

impl SavedModel {
    /// Wraps an estimator in the current encoding.
    pub fn new(estimator: Estimator) -> Self {
        Self {
            magic: SAVED_MODEL_MAGIC,
            format_version: SAVED_MODEL_FORMAT,
            estimator,
        }
    }

    /// Encodes to bytes. Deterministic for equal models.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decodes bytes, rejecting anything that is not a valid model.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < SAVED_MODEL_MAGIC.len() || bytes[..4] != SAVED_MODEL_MAGIC {
            return Err(GateError::ArtifactCorrupt(
                "missing model header".to_string(),
            ));
        }

        let model: SavedModel = bincode::deserialize(bytes)
            .map_err(|e| GateError::ArtifactCorrupt(e.to_string()))?;

        if model.format_version != SAVED_MODEL_FORMAT {
            return Err(GateError::ArtifactCorrupt(format!(
                "unsupported format version {} (expected {})",
                model.format_version, SAVED_MODEL_FORMAT
            )));
        }

        model.estimator.validate()?;
        Ok(model)
    }

    /// Short estimator name for logs.
    pub fn kind(&self) -> &'static str {
        self.estimator.kind()
    }
}

impl Classifier for SavedModel {
    fn predict(&self, text: &str) -> Result<String> {
        self.estimator.predict(text)
    }

    fn confidence_scorer(&self) -> Option<&dyn ConfidenceScorer> {
        self.estimator.confidence_scorer()
    }
}

/// A loaded, immutable model plus its optional version tag.
#[derive(Clone)]
pub struct ModelArtifact {
    model: Arc<dyn Classifier>,
    version: Option<String>,
}

impl ModelArtifact {
    /// Creates an artifact without a version tag.
    pub fn new(model: Arc<dyn Classifier>) -> Self {
        Self {
            model,
            version: None,
        }
    }

    /// Sets the version tag.
    pub fn with_version(mut self, version: Option<String>) -> Self {
        self.version = version;
        self
    }

    /// Gets the version tag.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Predicts a label.
    pub fn predict(&self, text: &str) -> Result<String> {
        self.model.predict(text)
    }

    /// Confidence for `text`, or `None` when the model cannot score.
    pub fn confidence(&self, text: &str) -> Result<Option<f64>> {
        self.model
            .confidence_scorer()
            .map(|scorer| scorer.confidence(text))
            .transpose()
    }

    /// Whether the underlying model exposes probability estimates.
    pub fn supports_confidence(&self) -> bool {
        self.model.confidence_scorer().is_some()
    }
}

impl fmt::Debug for ModelArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelArtifact")
            .field("version", &self.version)
            .field("supports_confidence", &self.supports_confidence())
            .finish()
    }
}
