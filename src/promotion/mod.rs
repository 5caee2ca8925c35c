//! Promotion pipeline.
//!
//! Selects a run from the registry, materializes its model into the serving
//! artifact layout and records which run was promoted:
//!
//! ```text
//! Start -> RunSelected -> Downloaded -> Loaded -> Published
//!      \-> SelectionFailed  \-> DownloadFailed  \-> LoadFailed  \-> PublishFailed
//! ```
//!
//! Each invocation stages its download in a temporary directory that is removed on
//! every exit path. The artifact and its provenance file are written to temporary
//! files beside their destinations and renamed into place, so a failed promotion
//! leaves the previous artifact untouched.

use crate::artifact::provenance_path;
use crate::error::{GateError, Result};
use crate::registry::{ModelUri, RunOrder, RunRecord, RunRegistry};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};
use tracing::{info, warn};

/// Upper bound on runs considered during selection.
pub const DEFAULT_MAX_RUNS: usize = 100;

/// Prefix for staging directories.
const STAGING_PREFIX: &str = "modelgate_promote_";

/// How the run to promote is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunSelection {
    /// Promote this run directly.
    RunId(String),
    /// Promote the best run of an experiment.
    Best {
        experiment_name: String,
        order: RunOrder,
    },
}

/// Inputs of one promotion.
#[derive(Debug, Clone)]
pub struct PromotionRequest {
    pub selection: RunSelection,
    /// Artifact subtree under the run where the model was logged
    pub model_artifact_path: String,
    /// Final artifact location
    pub out_path: PathBuf,
    /// Runs fetched during selection
    pub max_results: usize,
}

impl PromotionRequest {
    pub fn new(selection: RunSelection, out_path: impl Into<PathBuf>) -> Self {
        Self {
            selection,
            model_artifact_path: "model".to_string(),
            out_path: out_path.into(),
            max_results: DEFAULT_MAX_RUNS,
        }
    }

    pub fn with_model_artifact_path(mut self, path: impl Into<String>) -> Self {
        self.model_artifact_path = path.into();
        self
    }
}

/// Pipeline stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PromotionStage {
    Start,
    RunSelected,
    Downloaded,
    Loaded,
    Published,
}

impl fmt::Display for PromotionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PromotionStage::Start => "start",
            PromotionStage::RunSelected => "run_selected",
            PromotionStage::Downloaded => "downloaded",
            PromotionStage::Loaded => "loaded",
            PromotionStage::Published => "published",
        };
        f.write_str(name)
    }
}

/// Result of a successful promotion.
#[derive(Debug, Clone, PartialEq)]
pub struct PromotionOutcome {
    pub run_id: String,
    pub artifact_path: PathBuf,
    pub provenance_path: PathBuf,
    /// Metrics of the selected run; `None` when the run was named explicitly
    pub metrics: Option<BTreeMap<String, f64>>,
    pub bytes_written: usize,
}

/// Finds the best run of `experiment_name` according to `order`.
pub async fn find_best_run(
    registry: &dyn RunRegistry,
    experiment_name: &str,
    order: &RunOrder,
    max_results: usize,
) -> Result<RunRecord> {
    let experiments = registry.list_experiments().await?;
    let experiment = experiments
        .iter()
        .find(|e| e.name == experiment_name)
        .ok_or_else(|| GateError::ExperimentNotFound {
            name: experiment_name.to_string(),
            available: experiments.iter().map(|e| e.name.clone()).collect(),
        })?;

    let mut runs = registry
        .search_runs(&experiment.experiment_id, order, max_results)
        .await?;
    rank_runs(&mut runs, order);

    runs.into_iter().next().ok_or_else(|| GateError::NoRunsFound {
        experiment: experiment_name.to_string(),
    })
}

/// Stable sort by the ranking metric. Ties keep registry order; runs without the
/// metric, or with a NaN value, go last.
pub fn rank_runs(runs: &mut [RunRecord], order: &RunOrder) {
    let key = |run: &RunRecord| run.metric(&order.metric).filter(|v| !v.is_nan());

    runs.sort_by(|a, b| match (key(a), key(b)) {
        (Some(x), Some(y)) => {
            let cmp = x.total_cmp(&y);
            if order.maximize {
                cmp.reverse()
            } else {
                cmp
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// Runs one promotion end to end.
pub async fn promote(
    registry: &dyn RunRegistry,
    request: &PromotionRequest,
) -> Result<PromotionOutcome> {
    let result = run_pipeline(registry, request).await;
    crate::observability::record_promotion(result.is_ok());
    result
}

async fn run_pipeline(
    registry: &dyn RunRegistry,
    request: &PromotionRequest,
) -> Result<PromotionOutcome> {
    info!(stage = %PromotionStage::Start, out = %request.out_path.display(), "Starting promotion");

    let (run_id, metrics) = match &request.selection {
        RunSelection::RunId(run_id) => (run_id.clone(), None),
        RunSelection::Best {
            experiment_name,
            order,
        } => {
            let run = find_best_run(registry, experiment_name, order, request.max_results).await?;
            info!(
                run_id = %run.run_id,
                run_name = run.run_name.as_deref().unwrap_or("-"),
                started = %run.start_time.map(|t| t.to_rfc3339()).unwrap_or_default(),
                metrics = ?run.metrics,
                "Selected run"
            );
            (run.run_id, Some(run.metrics))
        }
    };
    info!(stage = %PromotionStage::RunSelected, run_id = %run_id, "Run selected");

    let staging = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir()
        .map_err(|e| GateError::DownloadFailed(format!("cannot create staging area: {}", e)))?;

    let published = materialize(registry, request, &run_id, &staging).await;
    release_staging(staging);
    let bytes_written = published?;

    let provenance = provenance_path(&request.out_path);
    info!(
        stage = %PromotionStage::Published,
        run_id = %run_id,
        artifact = %request.out_path.display(),
        bytes = bytes_written,
        "Promoted run"
    );

    Ok(PromotionOutcome {
        run_id,
        artifact_path: request.out_path.clone(),
        provenance_path: provenance,
        metrics,
        bytes_written,
    })
}

async fn materialize(
    registry: &dyn RunRegistry,
    request: &PromotionRequest,
    run_id: &str,
    staging: &TempDir,
) -> Result<usize> {
    let artifact_path = request.model_artifact_path.trim_matches('/');

    registry
        .download_artifacts(run_id, artifact_path, staging.path())
        .await
        .map_err(|e| GateError::DownloadFailed(e.to_string()))?;
    let (model_dir, fallback) = locate_model_dir(staging.path(), artifact_path);
    info!(
        stage = %PromotionStage::Downloaded,
        model_dir = %model_dir.display(),
        fallback,
        "Artifacts staged"
    );

    let uri = ModelUri::new(run_id, artifact_path);
    let model = registry
        .load_model(&uri)
        .await
        .map_err(|e| GateError::ModelLoadFailed(format!("{}: {}", uri, e)))?;
    info!(stage = %PromotionStage::Loaded, uri = %uri, kind = model.kind(), "Model loaded");

    let bytes = model
        .encode()
        .map_err(|e| GateError::PublishFailed(e.to_string()))?;
    publish(&request.out_path, &bytes, run_id)
        .map_err(|e| GateError::PublishFailed(format!("{}: {}", request.out_path.display(), e)))?;

    Ok(bytes.len())
}

/// Model directory inside the staging area, or the staging root when the registry
/// laid the download out differently. The flag is true on fallback.
pub fn locate_model_dir(staging: &Path, artifact_path: &str) -> (PathBuf, bool) {
    let candidate = staging.join(artifact_path);
    if !artifact_path.is_empty() && candidate.is_dir() {
        (candidate, false)
    } else {
        (staging.to_path_buf(), true)
    }
}

/// Atomically replaces the artifact, then the provenance file beside it.
pub fn publish(out_path: &Path, model_bytes: &[u8], run_id: &str) -> std::io::Result<()> {
    let dir = match out_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let model_file = stage_file(&dir, model_bytes)?;
    let provenance_file = stage_file(&dir, format!("{}\n", run_id).as_bytes())?;

    model_file.persist(out_path).map_err(|e| e.error)?;

    let provenance = provenance_path(out_path);
    if let Err(e) = provenance_file.persist(&provenance) {
        warn!(
            run_id,
            artifact = %out_path.display(),
            provenance = %provenance.display(),
            error = %e.error,
            "Artifact replaced but provenance not updated; it names the previous run"
        );
        return Err(e.error);
    }
    Ok(())
}

fn stage_file(dir: &Path, contents: &[u8]) -> std::io::Result<NamedTempFile> {
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o644))?;
    }

    Ok(file)
}

fn release_staging(staging: TempDir) {
    let path = staging.path().to_path_buf();
    if let Err(e) = staging.close() {
        warn!(path = %path.display(), error = %e, "Failed to remove staging area");
    }
}
