// Concrete estimators that can live inside a SavedModel

use super::{Classifier, ConfidenceScorer};
use crate::error::{GateError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Words dropped by [`Tokenizer::english`].
const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is",
    "it", "its", "of", "on", "or", "that", "the", "this", "to", "was", "were", "will", "with",
    "you", "your",
];

/// Splits text into word tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokenizer {
    /// Lowercase tokens before lookup
    pub lowercase: bool,
    /// Tokens to drop
    pub stop_words: BTreeSet<String>,
}

impl Tokenizer {
    /// Lowercasing tokenizer without stop words.
    pub fn plain() -> Self {
        Self {
            lowercase: true,
            stop_words: BTreeSet::new(),
        }
    }

    /// Lowercasing tokenizer with a small English stop list.
    pub fn english() -> Self {
        Self {
            lowercase: true,
            stop_words: ENGLISH_STOP_WORDS.iter().map(|w| w.to_string()).collect(),
        }
    }

    /// Tokenizes on non-alphanumeric boundaries.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| if self.lowercase { t.to_lowercase() } else { t.to_string() })
            .filter(|t| !self.stop_words.contains(t))
            .collect()
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::english()
    }
}

/// Estimator variants an artifact may carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Estimator {
    /// Multinomial naive Bayes; supports confidence.
    NaiveBayes(NaiveBayes),
    /// Linear decision function; label only.
    Linear(LinearModel),
}

impl Estimator {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Estimator::NaiveBayes(_) => "naive_bayes",
            Estimator::Linear(_) => "linear",
        }
    }

    /// Structural checks applied after decoding.
    pub fn validate(&self) -> Result<()> {
        match self {
            Estimator::NaiveBayes(nb) => nb.validate(),
            Estimator::Linear(lm) => lm.validate(),
        }
    }
}

impl Classifier for Estimator {
    fn predict(&self, text: &str) -> Result<String> {
        match self {
            Estimator::NaiveBayes(nb) => nb.predict(text),
            Estimator::Linear(lm) => lm.predict(text),
        }
    }

    fn confidence_scorer(&self) -> Option<&dyn ConfidenceScorer> {
        match self {
            Estimator::NaiveBayes(nb) => Some(nb),
            Estimator::Linear(_) => None,
        }
    }
}

/// Multinomial naive Bayes over token counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NaiveBayes {
    classes: Vec<String>,
    class_log_prior: Vec<f64>,
    feature_log_prob: BTreeMap<String, Vec<f64>>,
    tokenizer: Tokenizer,
}

impl NaiveBayes {
    /// Creates a model from explicit log-space parameters.
    pub fn new(
        classes: Vec<String>,
        class_log_prior: Vec<f64>,
        feature_log_prob: BTreeMap<String, Vec<f64>>,
        tokenizer: Tokenizer,
    ) -> Result<Self> {
        let model = Self {
            classes,
            class_log_prior,
            feature_log_prob,
            tokenizer,
        };
        model.validate()?;
        Ok(model)
    }

    /// Derives parameters from per-class document and token counts with additive
    /// smoothing `alpha`.
    pub fn from_counts(
        classes: &[(&str, u64)],
        token_counts: &BTreeMap<&str, Vec<u64>>,
        alpha: f64,
        tokenizer: Tokenizer,
    ) -> Result<Self> {
        let n_classes = classes.len();
        let total_docs: u64 = classes.iter().map(|(_, n)| n).sum();
        if total_docs == 0 {
            return Err(GateError::Internal("no documents to derive priors from".into()));
        }

        let class_log_prior = classes
            .iter()
            .map(|(_, n)| (*n as f64 / total_docs as f64).ln())
            .collect();

        let mut totals = vec![0u64; n_classes];
        for counts in token_counts.values() {
            if counts.len() != n_classes {
                return Err(GateError::Internal("token count width mismatch".into()));
            }
            for (total, count) in totals.iter_mut().zip(counts) {
                *total += count;
            }
        }

        let vocab = token_counts.len() as f64;
        let feature_log_prob = token_counts
            .iter()
            .map(|(token, counts)| {
                let logp = counts
                    .iter()
                    .zip(&totals)
                    .map(|(c, t)| ((*c as f64 + alpha) / (*t as f64 + alpha * vocab)).ln())
                    .collect();
                (token.to_string(), logp)
            })
            .collect();

        Self::new(
            classes.iter().map(|(c, _)| c.to_string()).collect(),
            class_log_prior,
            feature_log_prob,
            tokenizer,
        )
    }

    /// Class labels in model order.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    fn validate(&self) -> Result<()> {
        if self.classes.is_empty() {
            return Err(GateError::ArtifactCorrupt("naive bayes has no classes".into()));
        }
        if self.classes.iter().any(|c| c.is_empty()) {
            return Err(GateError::ArtifactCorrupt("empty class label".into()));
        }
        if self.class_log_prior.len() != self.classes.len() {
            return Err(GateError::ArtifactCorrupt(format!(
                "{} priors for {} classes",
                self.class_log_prior.len(),
                self.classes.len()
            )));
        }
        if let Some((token, _)) = self
            .feature_log_prob
            .iter()
            .find(|(_, logp)| logp.len() != self.classes.len())
        {
            return Err(GateError::ArtifactCorrupt(format!(
                "token '{}' has wrong class width",
                token
            )));
        }
        Ok(())
    }

    fn joint_log_likelihood(&self, text: &str) -> Vec<f64> {
        let mut jll = self.class_log_prior.clone();
        for token in self.tokenizer.tokenize(text) {
            if let Some(logp) = self.feature_log_prob.get(&token) {
                for (acc, lp) in jll.iter_mut().zip(logp) {
                    *acc += lp;
                }
            }
        }
        jll
    }
}

impl Classifier for NaiveBayes {
    fn predict(&self, text: &str) -> Result<String> {
        let jll = self.joint_log_likelihood(text);
        let best = argmax(&jll)
            .ok_or_else(|| GateError::Inference("joint likelihood is not finite".into()))?;
        Ok(self.classes[best].clone())
    }
}

impl ConfidenceScorer for NaiveBayes {
    fn predict_proba(&self, text: &str) -> Result<Vec<f64>> {
        let jll = self.joint_log_likelihood(text);
        let max = jll.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if !max.is_finite() {
            return Err(GateError::Inference("joint likelihood is not finite".into()));
        }
        let exp: Vec<f64> = jll.iter().map(|v| (v - max).exp()).collect();
        let sum: f64 = exp.iter().sum();
        Ok(exp.into_iter().map(|v| v / sum).collect())
    }
}

/// Linear decision function over token occurrences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    negative_label: String,
    positive_label: String,
    weights: BTreeMap<String, f64>,
    intercept: f64,
    tokenizer: Tokenizer,
}

impl LinearModel {
    /// Creates a model. A positive decision value selects `positive_label`.
    pub fn new(
        negative_label: impl Into<String>,
        positive_label: impl Into<String>,
        weights: BTreeMap<String, f64>,
        intercept: f64,
        tokenizer: Tokenizer,
    ) -> Result<Self> {
        let model = Self {
            negative_label: negative_label.into(),
            positive_label: positive_label.into(),
            weights,
            intercept,
            tokenizer,
        };
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<()> {
        if self.negative_label.is_empty() || self.positive_label.is_empty() {
            return Err(GateError::ArtifactCorrupt("empty class label".into()));
        }
        if !self.intercept.is_finite() || self.weights.values().any(|w| !w.is_finite()) {
            return Err(GateError::ArtifactCorrupt("non-finite weight".into()));
        }
        Ok(())
    }

    /// Raw decision value for `text`.
    pub fn decision_function(&self, text: &str) -> f64 {
        self.tokenizer
            .tokenize(text)
            .iter()
            .filter_map(|t| self.weights.get(t))
            .fold(self.intercept, |acc, w| acc + w)
    }
}

impl Classifier for LinearModel {
    fn predict(&self, text: &str) -> Result<String> {
        let label = if self.decision_function(text) > 0.0 {
            &self.positive_label
        } else {
            &self.negative_label
        };
        Ok(label.clone())
    }
}

/// Index of the first maximum, ignoring NaN.
fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .fold(None, |best: Option<(usize, f64)>, (i, v)| match best {
            Some((_, b)) if *v <= b => best,
            _ => Some((i, *v)),
        })
        .map(|(i, _)| i)
}
