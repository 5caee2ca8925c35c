// Evaluation client wire contract: binary labels round-trip through `/predict`

use crate::error::{GateError, Result};
use serde_json::Value;

/// Response keys that may carry the predicted label, in lookup order.
const LABEL_KEYS: [&str; 2] = ["label", "prediction"];

/// Extracts a binary label from a `/predict` response body.
///
/// The label may be a JSON integer, an integral float such as `1.0`, or a numeric
/// string. Anything outside `{0, 1}` is rejected.
pub fn parse_predicted_label(response: &Value) -> Result<u8> {
    let object = response
        .as_object()
        .ok_or_else(|| GateError::MalformedResponse(format!("expected an object, got {}", response)))?;

    let raw = LABEL_KEYS
        .iter()
        .find_map(|key| object.get(*key))
        .ok_or_else(|| GateError::MalformedResponse(format!("no label in {}", response)))?;

    let parsed = match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|v| v.fract() == 0.0).map(|v| v as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    parsed
        .and_then(binary)
        .ok_or_else(|| GateError::MalformedResponse(format!("label {} is not 0 or 1", raw)))
}

/// Parses a ground-truth cell from an evaluation file.
pub fn parse_ground_truth(raw: &str) -> Result<u8> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .and_then(binary)
        .ok_or_else(|| GateError::InvalidGroundTruth(raw.to_string()))
}

fn binary(value: i64) -> Option<u8> {
    match value {
        0 => Some(0),
        1 => Some(1),
        _ => None,
    }
}
