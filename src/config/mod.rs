//! Configuration module for modelgate.

use crate::error::{GateError, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the baked-in model artifact.
pub const DEFAULT_MODEL_PATH: &str = "/app/model/model.bin";

/// Default location of the version marker next to the artifact.
pub const DEFAULT_VERSION_PATH: &str = "/app/model/VERSION";

/// Default tracking server when neither flag nor environment names one.
pub const DEFAULT_TRACKING_URI: &str = "http://127.0.0.1:5000";

/// Main configuration for a modelgate process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Where the serving process reads its artifact from.
    #[serde(default)]
    pub artifact: ArtifactConfig,
    /// Run registry connection settings.
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Promotion defaults.
    #[serde(default)]
    pub promotion: PromotionConfig,
    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl GateConfig {
    /// Load configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GateError::Config(format!("Failed to read config file: {}", e))
        })?;

        let config: Self = serde_json::from_str(&content).map_err(|e| {
            GateError::Config(format!("Failed to parse config: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.artifact.model_path.as_os_str().is_empty() {
            return Err(GateError::InvalidConfig {
                field: "artifact.model_path".to_string(),
                reason: "Model path must not be empty".to_string(),
            });
        }

        if !self.registry.tracking_uri.starts_with("http://")
            && !self.registry.tracking_uri.starts_with("https://")
        {
            return Err(GateError::InvalidConfig {
                field: "registry.tracking_uri".to_string(),
                reason: format!("Unsupported scheme in '{}'", self.registry.tracking_uri),
            });
        }

        if self.promotion.metric.trim().is_empty() {
            return Err(GateError::InvalidConfig {
                field: "promotion.metric".to_string(),
                reason: "Ranking metric must not be empty".to_string(),
            });
        }

        if self.promotion.max_results == 0 {
            return Err(GateError::InvalidConfig {
                field: "promotion.max_results".to_string(),
                reason: "At least one run must be considered".to_string(),
            });
        }

        Ok(())
    }

    /// Create a local development configuration.
    pub fn development() -> Self {
        Self {
            server: ServerConfig {
                bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
                metrics_enabled: false,
            },
            artifact: ArtifactConfig {
                model_path: PathBuf::from("model_repo/model.bin"),
                version_path: PathBuf::from("model_repo/VERSION"),
            },
            registry: RegistryConfig::default(),
            promotion: PromotionConfig::default(),
            observability: ObservabilityConfig {
                log_level: "debug".to_string(),
                json_logs: false,
            },
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the prediction service.
    pub bind_addr: SocketAddr,
    /// Expose Prometheus metrics on `/metrics`.
    pub metrics_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            metrics_enabled: true,
        }
    }
}

/// Artifact location read by the serving process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Serialized model.
    pub model_path: PathBuf,
    /// Optional version marker.
    pub version_path: PathBuf,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            version_path: PathBuf::from(DEFAULT_VERSION_PATH),
        }
    }
}

/// Run registry connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Base URI of the tracking server.
    pub tracking_uri: String,
    /// Connection timeout. Requests themselves are not time-limited.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            tracking_uri: DEFAULT_TRACKING_URI.to_string(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Defaults for the promotion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromotionConfig {
    /// Artifact subtree under the run where the model was logged.
    pub model_artifact_path: String,
    /// Where the promoted model is written.
    pub out_path: PathBuf,
    /// Metric used to rank runs.
    pub metric: String,
    /// Rank descending when true.
    pub maximize: bool,
    /// Upper bound on runs fetched from the registry.
    pub max_results: usize,
}

impl Default for PromotionConfig {
    fn default() -> Self {
        Self {
            model_artifact_path: "model".to_string(),
            out_path: PathBuf::from("model_repo/model.bin"),
            metric: "macro_f1".to_string(),
            maximize: true,
            max_results: 100,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level.
    pub log_level: String,
    /// Enable JSON logging.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Serde helper for Duration using humantime format.
pub mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}ms", duration.as_millis()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(crate) fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        if let Some(ms) = s.strip_suffix("ms") {
            ms.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| e.to_string())
        } else if let Some(s_val) = s.strip_suffix('s') {
            s_val
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| e.to_string())
        } else if let Some(m) = s.strip_suffix('m') {
            m.parse::<u64>()
                .map(|v| Duration::from_secs(v * 60))
                .map_err(|e| e.to_string())
        } else {
            s.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| e.to_string())
        }
    }
}
