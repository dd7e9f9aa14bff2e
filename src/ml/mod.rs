//! Frozen classifiers loaded from JSON artifacts and combined into one emotion label.
//!
//! Every component is plain data deserialized with serde and validated once at load;
//! inference is pure Rust with no training-time dependencies.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

pub mod artifacts;
pub mod ensemble;
pub mod forest;
pub mod label_codec;
pub mod meta;
pub mod scaler;
pub mod sequence;

pub use artifacts::ModelArtifacts;
pub use ensemble::{EmotionLabel, EnsemblePredictor, PredictionError, Stage};

/// Errors raised while loading or validating model artifacts.
#[derive(Debug, Error)]
pub enum ModelError {
    /// One or more required artifact files are absent.
    #[error("Missing model artifacts in {}: {}", .dir.display(), .missing.join(", "))]
    MissingArtifacts {
        dir: PathBuf,
        missing: Vec<&'static str>,
    },
    #[error("Failed to read model artifact {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse model artifact {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// The artifact parsed but is structurally unusable.
    #[error("Invalid model artifact {artifact}: {reason}")]
    Invalid {
        artifact: &'static str,
        reason: String,
    },
    /// Two artifacts disagree about a dimension.
    #[error("{artifact} expects {expected} {what} but {found} were found")]
    ShapeMismatch {
        artifact: &'static str,
        what: &'static str,
        expected: usize,
        found: usize,
    },
}

/// Read and deserialize one JSON artifact.
pub(crate) fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, ModelError> {
    let bytes = std::fs::read(path).map_err(|source| ModelError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| ModelError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Compute a numerically-stable softmax for a set of logits.
///
/// Non-finite logits yield an all-NaN distribution so the caller rejects it.
pub fn softmax(raw: &[f32]) -> Vec<f32> {
    if raw.iter().any(|v| !v.is_finite()) {
        return vec![f32::NAN; raw.len()];
    }
    let max = raw.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = raw.iter().map(|&v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Index of the first maximum; `None` for empty input or when a NaN is present.
pub fn argmax(values: &[f32]) -> Option<usize> {
    if values.iter().any(|v| v.is_nan()) {
        return None;
    }
    let mut best: Option<(usize, f32)> = None;
    for (idx, &value) in values.iter().enumerate() {
        if best.is_none_or(|(_, top)| value > top) {
            best = Some((idx, value));
        }
    }
    best.map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn softmax_sums_to_one_and_preserves_order() {
        let out = softmax(&[1.0, 3.0, 2.0]);
        let sum: f32 = out.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(out[1] > out[2] && out[2] > out[0]);
        assert!(softmax(&[]).is_empty());
    }

    #[test]
    fn softmax_survives_large_logits() {
        let out = softmax(&[1_000.0, 1_000.0]);
        assert!((out[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn softmax_of_overflowed_logits_is_not_a_distribution() {
        let out = softmax(&[f32::INFINITY, 1.0, f32::NEG_INFINITY]);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|p| p.is_nan()));
    }

    #[test]
    fn argmax_prefers_first_maximum() {
        assert_eq!(argmax(&[0.2, 0.7, 0.7]), Some(1));
        assert_eq!(argmax(&[]), None);
        assert_eq!(argmax(&[0.1, f32::NAN]), None);
    }

    #[test]
    fn missing_artifacts_message_lists_every_file() {
        let err = ModelError::MissingArtifacts {
            dir: PathBuf::from("model"),
            missing: vec!["scaler.json", "rf_final.json"],
        };
        assert_eq!(
            err.to_string(),
            "Missing model artifacts in model: scaler.json, rf_final.json"
        );
    }
}
