// Mock MLflow tracking server served by axum on an ephemeral port

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Experiments returned per page, so paging is always exercised.
const EXPERIMENT_PAGE: usize = 2;

#[derive(Default)]
struct TrackingData {
    experiments: Vec<(String, String)>,
    runs: Vec<Value>,
    /// (run_id, path) -> bytes
    artifacts: BTreeMap<(String, String), Vec<u8>>,
    /// Every request body sent to runs/search
    run_searches: Vec<Value>,
}

/// Tracking server double. Dropping it stops the server.
pub struct MockTrackingServer {
    pub addr: SocketAddr,
    data: Arc<Mutex<TrackingData>>,
    handle: JoinHandle<()>,
}

impl MockTrackingServer {
    pub async fn start() -> Self {
        let data = Arc::new(Mutex::new(TrackingData::default()));
        let app = Router::new()
            .route("/api/2.0/mlflow/experiments/search", post(search_experiments))
            .route("/api/2.0/mlflow/runs/search", post(search_runs))
            .route("/api/2.0/mlflow/artifacts/list", get(list_artifacts))
            .route("/get-artifact", get(get_artifact))
            .with_state(data.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock server");
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self { addr, data, handle }
    }

    pub fn uri(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn add_experiment(&self, id: &str, name: &str) {
        self.data
            .lock()
            .unwrap()
            .experiments
            .push((id.to_string(), name.to_string()));
    }

    /// Adds a finished run. `start_time` is sent as a string like newer servers do.
    pub fn add_run(&self, experiment_id: &str, run_id: &str, metrics: &[(&str, f64)]) {
        let metrics: Vec<Value> = metrics
            .iter()
            .map(|(key, value)| {
                json!({"key": key, "value": wire_double(*value), "timestamp": 1, "step": 0})
            })
            .collect();
        self.data.lock().unwrap().runs.push(json!({
            "info": {
                "run_id": run_id,
                "run_uuid": run_id,
                "experiment_id": experiment_id,
                "run_name": format!("run-{}", run_id),
                "status": "FINISHED",
                "start_time": "1700000000000",
                "artifact_uri": format!("mlflow-artifacts:/{}/{}/artifacts", experiment_id, run_id),
            },
            "data": {"metrics": metrics, "params": []}
        }));
    }

    pub fn add_artifact(&self, run_id: &str, path: &str, bytes: &[u8]) {
        self.data
            .lock()
            .unwrap()
            .artifacts
            .insert((run_id.to_string(), path.to_string()), bytes.to_vec());
    }

    pub fn run_searches(&self) -> Vec<Value> {
        self.data.lock().unwrap().run_searches.clone()
    }
}

impl Drop for MockTrackingServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Non-finite doubles go over the wire as strings.
fn wire_double(value: f64) -> Value {
    if value.is_nan() {
        json!("NaN")
    } else if value == f64::INFINITY {
        json!("Infinity")
    } else if value == f64::NEG_INFINITY {
        json!("-Infinity")
    } else {
        json!(value)
    }
}

type Shared = State<Arc<Mutex<TrackingData>>>;

async fn search_experiments(State(data): Shared, Json(body): Json<Value>) -> Json<Value> {
    let data = data.lock().unwrap();
    let start: usize = body
        .get("page_token")
        .and_then(Value::as_str)
        .and_then(|t| t.parse().ok())
        .unwrap_or(0);
    let end = (start + EXPERIMENT_PAGE).min(data.experiments.len());

    let page: Vec<Value> = data.experiments[start..end]
        .iter()
        .map(|(id, name)| json!({"experiment_id": id, "name": name, "lifecycle_stage": "active"}))
        .collect();

    if end < data.experiments.len() {
        Json(json!({"experiments": page, "next_page_token": end.to_string()}))
    } else {
        Json(json!({"experiments": page}))
    }
}

async fn search_runs(State(data): Shared, Json(body): Json<Value>) -> Json<Value> {
    let mut data = data.lock().unwrap();
    data.run_searches.push(body.clone());

    let ids: BTreeSet<String> = body["experiment_ids"]
        .as_array()
        .map(|ids| ids.iter().filter_map(|v| v.as_str().map(String::from)).collect())
        .unwrap_or_default();
    let max = body["max_results"].as_u64().unwrap_or(1000) as usize;

    let runs: Vec<Value> = data
        .runs
        .iter()
        .filter(|r| r["info"]["experiment_id"].as_str().is_some_and(|id| ids.contains(id)))
        .take(max)
        .cloned()
        .collect();

    if runs.is_empty() {
        Json(json!({}))
    } else {
        Json(json!({"runs": runs}))
    }
}

#[derive(Deserialize)]
struct ListParams {
    run_id: String,
    #[serde(default)]
    path: String,
}

async fn list_artifacts(State(data): Shared, Query(params): Query<ListParams>) -> Json<Value> {
    let data = data.lock().unwrap();
    let prefix = if params.path.is_empty() {
        String::new()
    } else {
        format!("{}/", params.path)
    };

    let mut children: BTreeMap<String, bool> = BTreeMap::new();
    for (run_id, path) in data.artifacts.keys() {
        if *run_id != params.run_id {
            continue;
        }
        if let Some(rest) = path.strip_prefix(&prefix) {
            match rest.split_once('/') {
                Some((dir, _)) => children.insert(format!("{}{}", prefix, dir), true),
                None => children.insert(path.clone(), false),
            };
        }
    }

    let files: Vec<Value> = children
        .into_iter()
        .map(|(path, is_dir)| json!({"path": path, "is_dir": is_dir}))
        .collect();
    Json(json!({"root_uri": "mlflow-artifacts:/", "files": files}))
}

#[derive(Deserialize)]
struct ArtifactParams {
    path: String,
    run_uuid: String,
}

async fn get_artifact(State(data): Shared, Query(params): Query<ArtifactParams>) -> Response {
    let data = data.lock().unwrap();
    match data.artifacts.get(&(params.run_uuid, params.path)) {
        Some(bytes) => bytes.clone().into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"error_code": "RESOURCE_DOES_NOT_EXIST"})),
        )
            .into_response(),
    }
}
