// In-process run registry for promotion tests

use async_trait::async_trait;
use modelgate::artifact::LOGGED_MODEL_FILE_NAME;
use modelgate::registry::{safe_join, Experiment, ModelUri, RunOrder, RunRecord, RunRegistry};
use modelgate::{GateError, Result, SavedModel};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Failure to inject at one pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    None,
    Download,
    Load,
}

/// Registry backed by in-memory experiments, runs and models.
pub struct FakeRegistry {
    experiments: Vec<Experiment>,
    runs: BTreeMap<String, Vec<RunRecord>>,
    models: BTreeMap<String, SavedModel>,
    fault: Fault,
    /// Staging directories handed to `download_artifacts`
    pub staged: Mutex<Vec<PathBuf>>,
    /// `order_by` clauses received by `search_runs`
    pub orders: Mutex<Vec<String>>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self {
            experiments: Vec::new(),
            runs: BTreeMap::new(),
            models: BTreeMap::new(),
            fault: Fault::None,
            staged: Mutex::new(Vec::new()),
            orders: Mutex::new(Vec::new()),
        }
    }

    pub fn with_experiment(mut self, experiment: Experiment) -> Self {
        self.experiments.push(experiment);
        self
    }

    /// Adds a run and the model it logged.
    pub fn with_run(mut self, run: RunRecord, model: SavedModel) -> Self {
        self.models.insert(run.run_id.clone(), model);
        self.runs.entry(run.experiment_id.clone()).or_default().push(run);
        self
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = fault;
        self
    }

    pub fn staged_dirs(&self) -> Vec<PathBuf> {
        self.staged.lock().unwrap().clone()
    }
}

impl Default for FakeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RunRegistry for FakeRegistry {
    async fn list_experiments(&self) -> Result<Vec<Experiment>> {
        Ok(self.experiments.clone())
    }

    async fn search_runs(
        &self,
        experiment_id: &str,
        order: &RunOrder,
        max_results: usize,
    ) -> Result<Vec<RunRecord>> {
        self.orders.lock().unwrap().push(order.order_by_clause());
        let runs = self.runs.get(experiment_id).cloned().unwrap_or_default();
        Ok(runs.into_iter().take(max_results).collect())
    }

    async fn download_artifacts(&self, run_id: &str, path: &str, dst: &Path) -> Result<PathBuf> {
        self.staged.lock().unwrap().push(dst.to_path_buf());
        if self.fault == Fault::Download {
            return Err(GateError::Network("connection reset".into()));
        }

        let model = self
            .models
            .get(run_id)
            .ok_or_else(|| GateError::Registry(format!("unknown run {}", run_id)))?;
        let dir = safe_join(dst, path)?;
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join(LOGGED_MODEL_FILE_NAME), model.encode()?)?;
        std::fs::write(dir.join("MLmodel"), "flavors: {}\n")?;
        Ok(dir)
    }

    async fn load_model(&self, uri: &ModelUri) -> Result<SavedModel> {
        if self.fault == Fault::Load {
            return Err(GateError::ArtifactCorrupt("bad magic".into()));
        }
        self.models
            .get(&uri.run_id)
            .cloned()
            .ok_or_else(|| GateError::Registry(format!("no model at {}", uri)))
    }
}
