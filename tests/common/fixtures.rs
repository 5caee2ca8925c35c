// Model and run fixtures shared by integration tests

use chrono::{TimeZone, Utc};
use modelgate::model::{Estimator, LinearModel, NaiveBayes, SavedModel, Tokenizer};
use modelgate::registry::{Experiment, RunRecord};
use std::collections::BTreeMap;

pub const SPAM_EXPERIMENT: &str = "spam_experiments";
pub const RANK_METRIC: &str = "macro_f1";

/// Naive Bayes spam filter with labels "0" (ham) and "1" (spam).
pub fn spam_model() -> SavedModel {
    let counts: BTreeMap<&str, Vec<u64>> = BTreeMap::from([
        ("win", vec![1, 30]),
        ("money", vec![2, 25]),
        ("click", vec![1, 20]),
        ("free", vec![3, 28]),
        ("meeting", vec![20, 1]),
        ("report", vec![15, 2]),
        ("lunch", vec![10, 1]),
        ("agenda", vec![12, 1]),
    ]);
    let nb = NaiveBayes::from_counts(&[("0", 60), ("1", 40)], &counts, 1.0, Tokenizer::english())
        .expect("valid counts");
    SavedModel::new(Estimator::NaiveBayes(nb))
}

/// Linear model without probability estimates.
pub fn linear_model() -> SavedModel {
    let weights = BTreeMap::from([
        ("win".to_string(), 1.5),
        ("free".to_string(), 1.2),
        ("meeting".to_string(), -2.0),
    ]);
    let model = LinearModel::new("0", "1", weights, -0.5, Tokenizer::english()).expect("valid weights");
    SavedModel::new(Estimator::Linear(model))
}

pub fn spam_model_bytes() -> Vec<u8> {
    spam_model().encode().expect("model encodes")
}

pub fn experiment(id: &str, name: &str) -> Experiment {
    Experiment {
        experiment_id: id.to_string(),
        name: name.to_string(),
    }
}

/// Run with an optional ranking metric value.
pub fn run(run_id: &str, experiment_id: &str, metric: Option<f64>) -> RunRecord {
    let mut metrics = BTreeMap::from([("accuracy".to_string(), 0.5)]);
    if let Some(value) = metric {
        metrics.insert(RANK_METRIC.to_string(), value);
    }
    RunRecord {
        run_id: run_id.to_string(),
        experiment_id: experiment_id.to_string(),
        run_name: Some(format!("run-{}", run_id)),
        metrics,
        artifact_path: format!("mlflow-artifacts:/{}/{}/artifacts", experiment_id, run_id),
        start_time: Utc.timestamp_millis_opt(1_700_000_000_000).single(),
    }
}
