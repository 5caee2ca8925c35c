//! Error types for modelgate.
//!
//! This module provides a unified error type [`GateError`] for serving, promotion and
//! configuration, along with a convenient [`Result`] type alias.
//!
//! # Error Categories
//!
//! - **Startup**: the artifact could not be found or decoded. These never crash the
//!   process; the readiness gate turns them into persistent unavailability.
//! - **Per-request**: the gate is not ready, or the model failed on one input.
//! - **Promotion**: selection, download, load or publish failed. The invocation aborts
//!   and nothing is left at the output path.
//! - **Evaluation contract**: a prediction or ground-truth row could not be read as a
//!   binary label. Callers skip the row.
//!
//! # Example
//!
//! ```rust
//! use modelgate::error::{GateError, Result};
//!
//! fn require_name(name: &str) -> Result<&str> {
//!     if name.is_empty() {
//!         return Err(GateError::Config("experiment name cannot be empty".into()));
//!     }
//!     Ok(name)
//! }
//!
//! let err = GateError::ServiceUnavailable("Model not loaded in image".into());
//! assert!(err.is_retryable());
//! assert_eq!(err.status_code(), 503);
//! ```

use std::io;
use thiserror::Error;

/// Main error type for modelgate operations.
#[derive(Error, Debug)]
pub enum GateError {
    // Startup errors
    #[error("Model not found at {0}")]
    ArtifactMissing(String),

    #[error("Model artifact is corrupt: {0}")]
    ArtifactCorrupt(String),

    // Request errors
    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    // Promotion errors
    #[error("Experiment named '{name}' not found. Available: {available:?}")]
    ExperimentNotFound { name: String, available: Vec<String> },

    #[error("No runs found in experiment {experiment}")]
    NoRunsFound { experiment: String },

    #[error("Artifact download failed: {0}")]
    DownloadFailed(String),

    #[error("Model load failed: {0}")]
    ModelLoadFailed(String),

    #[error("Publish failed: {0}")]
    PublishFailed(String),

    // Evaluation contract errors
    #[error("Invalid ground truth label: {0}")]
    InvalidGroundTruth(String),

    #[error("Bad response format: {0}")]
    MalformedResponse(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    // Registry and network errors
    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GateError {
    /// HTTP status code used when this error reaches a handler.
    pub fn status_code(&self) -> u16 {
        match self {
            GateError::ServiceUnavailable(_)
            | GateError::ArtifactMissing(_)
            | GateError::ArtifactCorrupt(_) => 503,
            _ => 500,
        }
    }

    /// Check if the caller may retry the same operation later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GateError::ServiceUnavailable(_) | GateError::Network(_))
    }
}

impl From<bincode::Error> for GateError {
    fn from(e: bincode::Error) -> Self {
        GateError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for GateError {
    fn from(e: serde_json::Error) -> Self {
        GateError::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for GateError {
    fn from(e: reqwest::Error) -> Self {
        GateError::Network(e.to_string())
    }
}

/// Result type alias for modelgate operations.
pub type Result<T> = std::result::Result<T, GateError>;
