// Run registry: the experiment-tracking service promotions read from

pub mod mlflow;

pub use mlflow::MlflowClient;

use crate::error::{GateError, Result};
use crate::model::SavedModel;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Scheme prefix of run-scoped model references.
const RUNS_SCHEME: &str = "runs:/";

/// Experiment known to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experiment {
    /// Registry-assigned identifier
    pub experiment_id: String,
    /// Unique name
    pub name: String,
}

/// One recorded training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Run identifier
    pub run_id: String,
    /// Owning experiment
    pub experiment_id: String,
    /// Display name, if set
    pub run_name: Option<String>,
    /// Final metric values
    pub metrics: BTreeMap<String, f64>,
    /// Root of the run's artifact tree
    pub artifact_path: String,
    /// When the run started
    pub start_time: Option<DateTime<Utc>>,
}

impl RunRecord {
    /// Gets a metric value.
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }
}

/// Ranking used to pick the best run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOrder {
    /// Metric key
    pub metric: String,
    /// Larger is better when true
    pub maximize: bool,
}

impl RunOrder {
    pub fn maximize(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            maximize: true,
        }
    }

    pub fn minimize(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            maximize: false,
        }
    }

    /// Registry `order_by` clause, e.g. `metrics.macro_f1 DESC`.
    pub fn order_by_clause(&self) -> String {
        format!(
            "metrics.{} {}",
            self.metric,
            if self.maximize { "DESC" } else { "ASC" }
        )
    }
}

/// Run-scoped model reference, `runs:/<run_id>/<artifact_path>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelUri {
    pub run_id: String,
    pub artifact_path: String,
}

impl ModelUri {
    pub fn new(run_id: impl Into<String>, artifact_path: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            artifact_path: artifact_path.into().trim_matches('/').to_string(),
        }
    }
}

impl fmt::Display for ModelUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", RUNS_SCHEME, self.run_id, self.artifact_path)
    }
}

impl FromStr for ModelUri {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix(RUNS_SCHEME)
            .ok_or_else(|| GateError::Config(format!("'{}' is not a runs:/ URI", s)))?;
        let (run_id, path) = rest.trim_start_matches('/').split_once('/').unwrap_or((rest, ""));
        if run_id.is_empty() || path.trim_matches('/').is_empty() {
            return Err(GateError::Config(format!(
                "'{}' must name both a run and an artifact path",
                s
            )));
        }
        Ok(Self::new(run_id, path))
    }
}

/// Operations the promotion pipeline needs from an experiment-tracking service.
#[async_trait]
pub trait RunRegistry: Send + Sync {
    /// All experiments.
    async fn list_experiments(&self) -> Result<Vec<Experiment>>;

    /// Runs of one experiment, best first according to `order`.
    async fn search_runs(
        &self,
        experiment_id: &str,
        order: &RunOrder,
        max_results: usize,
    ) -> Result<Vec<RunRecord>>;

    /// Downloads the artifact subtree `path` of `run_id` under `dst` and returns the
    /// local directory it landed in.
    async fn download_artifacts(&self, run_id: &str, path: &str, dst: &Path) -> Result<PathBuf>;

    /// Loads the model object a run logged at `uri`.
    async fn load_model(&self, uri: &ModelUri) -> Result<SavedModel>;
}

/// Joins a registry-relative path onto `root`, refusing anything that escapes it.
pub fn safe_join(root: &Path, relative: &str) -> Result<PathBuf> {
    use std::path::Component;

    let relative = Path::new(relative);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(GateError::DownloadFailed(format!(
            "refusing artifact path '{}'",
            relative.display()
        )));
    }
    Ok(root.join(relative))
}
