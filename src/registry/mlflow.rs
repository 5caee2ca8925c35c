//! MLflow tracking server client.
//!
//! Talks to the REST API under `/api/2.0/mlflow` and to the artifact download
//! endpoint `/get-artifact`. Calls are issued one at a time with no retries; only
//! the connection phase is time-limited.

use super::{safe_join, Experiment, ModelUri, RunOrder, RunRecord, RunRegistry};
use crate::artifact::LOGGED_MODEL_FILE_NAME;
use crate::config::RegistryConfig;
use crate::error::{GateError, Result};
use crate::model::SavedModel;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, Response};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Page size used when listing experiments.
const EXPERIMENT_PAGE_SIZE: usize = 1000;

/// Client for an MLflow tracking server.
#[derive(Clone)]
pub struct MlflowClient {
    base_url: String,
    client: Client,
}

impl MlflowClient {
    /// Create a client for `tracking_uri`.
    pub fn new(tracking_uri: &str, connect_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| GateError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: tracking_uri.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Create a client from configuration.
    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        Self::new(&config.tracking_uri, config.connect_timeout)
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn api(&self, endpoint: &str) -> String {
        format!("{}/api/2.0/mlflow/{}", self.base_url, endpoint)
    }

    async fn post_json<B, T>(&self, endpoint: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: for<'de> Deserialize<'de>,
    {
        let url = self.api(endpoint);
        let response = self.client.post(&url).json(body).send().await?;
        let response = check_status(&url, response).await?;
        response
            .json()
            .await
            .map_err(|e| GateError::Registry(format!("Invalid response from {}: {}", url, e)))
    }

    async fn list_artifacts(&self, run_id: &str, path: &str) -> Result<Vec<FileInfoDto>> {
        let url = self.api("artifacts/list");
        let response = self
            .client
            .get(&url)
            .query(&[("run_id", run_id), ("path", path)])
            .send()
            .await?;
        let response = check_status(&url, response).await?;
        let listing: ListArtifactsResponse = response
            .json()
            .await
            .map_err(|e| GateError::Registry(format!("Invalid artifact listing: {}", e)))?;
        Ok(listing.files.unwrap_or_default())
    }

    async fn fetch_artifact(&self, run_id: &str, path: &str) -> Result<Vec<u8>> {
        let url = format!("{}/get-artifact", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("path", path), ("run_uuid", run_id)])
            .send()
            .await?;
        let response = check_status(&url, response).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl RunRegistry for MlflowClient {
    async fn list_experiments(&self) -> Result<Vec<Experiment>> {
        let mut experiments = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let request = SearchExperimentsRequest {
                max_results: EXPERIMENT_PAGE_SIZE,
                page_token: page_token.take(),
            };
            let page: SearchExperimentsResponse =
                self.post_json("experiments/search", &request).await?;

            experiments.extend(page.experiments.unwrap_or_default().into_iter().map(|e| {
                Experiment {
                    experiment_id: e.experiment_id,
                    name: e.name,
                }
            }));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(count = experiments.len(), "Listed experiments");
        Ok(experiments)
    }

    async fn search_runs(
        &self,
        experiment_id: &str,
        order: &RunOrder,
        max_results: usize,
    ) -> Result<Vec<RunRecord>> {
        let request = SearchRunsRequest {
            experiment_ids: vec![experiment_id.to_string()],
            order_by: vec![order.order_by_clause()],
            max_results,
        };
        let response: SearchRunsResponse = self.post_json("runs/search", &request).await?;

        let runs: Vec<RunRecord> = response
            .runs
            .unwrap_or_default()
            .into_iter()
            .map(RunDto::into_record)
            .collect();

        debug!(experiment_id, count = runs.len(), "Searched runs");
        Ok(runs)
    }

    async fn download_artifacts(&self, run_id: &str, path: &str, dst: &Path) -> Result<PathBuf> {
        let path = path.trim_matches('/');
        let mut pending = VecDeque::from([path.to_string()]);
        let mut downloaded = 0usize;

        while let Some(dir) = pending.pop_front() {
            let files = self.list_artifacts(run_id, &dir).await?;

            // Listing a file path yields nothing; fetch it directly.
            if files.is_empty() && dir == path {
                let bytes = self.fetch_artifact(run_id, &dir).await?;
                write_artifact(dst, &dir, &bytes).await?;
                downloaded += 1;
                continue;
            }

            for file in files {
                if file.is_dir {
                    pending.push_back(file.path);
                } else {
                    let bytes = self.fetch_artifact(run_id, &file.path).await?;
                    write_artifact(dst, &file.path, &bytes).await?;
                    downloaded += 1;
                }
            }
        }

        debug!(run_id, path, files = downloaded, "Downloaded artifacts");
        safe_join(dst, path)
    }

    async fn load_model(&self, uri: &ModelUri) -> Result<SavedModel> {
        let file = format!("{}/{}", uri.artifact_path, LOGGED_MODEL_FILE_NAME);
        let bytes = self.fetch_artifact(&uri.run_id, &file).await?;
        SavedModel::decode(&bytes)
    }
}

async fn check_status(url: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GateError::Registry(format!(
        "{} returned {}: {}",
        url,
        status.as_u16(),
        body.trim()
    )))
}

async fn write_artifact(root: &Path, relative: &str, bytes: &[u8]) -> Result<()> {
    let target = safe_join(root, relative)?;
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&target, bytes).await?;
    Ok(())
}

// Wire types

#[derive(Debug, Serialize)]
struct SearchExperimentsRequest {
    max_results: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchExperimentsResponse {
    experiments: Option<Vec<ExperimentDto>>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExperimentDto {
    experiment_id: String,
    name: String,
}

#[derive(Debug, Serialize)]
struct SearchRunsRequest {
    experiment_ids: Vec<String>,
    order_by: Vec<String>,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct SearchRunsResponse {
    runs: Option<Vec<RunDto>>,
}

#[derive(Debug, Deserialize)]
struct RunDto {
    info: RunInfoDto,
    #[serde(default)]
    data: RunDataDto,
}

impl RunDto {
    fn into_record(self) -> RunRecord {
        let metrics: BTreeMap<String, f64> = self
            .data
            .metrics
            .unwrap_or_default()
            .into_iter()
            .map(|m| (m.key, m.value))
            .collect();

        RunRecord {
            run_id: self.info.run_id,
            experiment_id: self.info.experiment_id,
            run_name: self.info.run_name,
            metrics,
            artifact_path: self.info.artifact_uri.unwrap_or_default(),
            start_time: self.info.start_time.as_ref().and_then(parse_millis),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RunInfoDto {
    run_id: String,
    experiment_id: String,
    run_name: Option<String>,
    artifact_uri: Option<String>,
    // int64 fields arrive as numbers or strings depending on server version
    start_time: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RunDataDto {
    metrics: Option<Vec<MetricDto>>,
}

#[derive(Debug, Deserialize)]
struct MetricDto {
    key: String,
    #[serde(deserialize_with = "deserialize_double")]
    value: f64,
}

#[derive(Debug, Deserialize)]
struct ListArtifactsResponse {
    files: Option<Vec<FileInfoDto>>,
}

#[derive(Debug, Deserialize)]
struct FileInfoDto {
    path: String,
    #[serde(default)]
    is_dir: bool,
}

/// Doubles arrive as JSON numbers, or as "NaN", "Infinity" and "-Infinity" strings
/// for values JSON cannot represent.
fn deserialize_double<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Double {
        Number(f64),
        Text(String),
    }

    match Double::deserialize(deserializer)? {
        Double::Number(v) => Ok(v),
        Double::Text(s) => match s.as_str() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            other => other
                .parse()
                .map_err(|_| serde::de::Error::custom(format!("invalid double '{}'", other))),
        },
    }
}

fn parse_millis(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    let millis = match value {
        serde_json::Value::Number(n) => n.as_i64()?,
        serde_json::Value::String(s) => s.parse().ok()?,
        _ => return None,
    };
    Utc.timestamp_millis_opt(millis).single()
}
