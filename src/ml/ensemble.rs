//! Stacked ensemble: scaler, three base classifiers and a meta-classifier.
//!
//! The meta-classifier was trained on base-model probabilities concatenated in the
//! fixed order CNN, LSTM, random forest. That order is part of the model contract and
//! must never change independently of the artifacts.

use std::fmt;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use super::artifacts::{
    CNN_FILE, LABEL_ENCODER_FILE, LSTM_FILE, META_CLASSIFIER_FILE, ModelArtifacts,
    RANDOM_FOREST_FILE, SCALER_FILE,
};
use super::forest::RandomForest;
use super::label_codec::LabelCodec;
use super::meta::MetaClassifier;
use super::scaler::StandardScaler;
use super::sequence::SequenceModel;
use super::{ModelError, load_json};
use crate::analysis::{FEATURE_DIM, FeatureVector};

/// Inference stage, used to attribute prediction failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Scaler,
    Cnn,
    Lstm,
    RandomForest,
    Meta,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Scaler => "scaler",
            Stage::Cnn => "cnn",
            Stage::Lstm => "lstm",
            Stage::RandomForest => "random forest",
            Stage::Meta => "meta-classifier",
        })
    }
}

/// Per-request inference failures. None of these are ever replaced by a default label.
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("{stage} expected {expected} values but got {found}")]
    Shape {
        stage: Stage,
        expected: usize,
        found: usize,
    },
    #[error("{stage} produced unusable output: {reason}")]
    Malformed { stage: Stage, reason: String },
    #[error("class index {index} is outside the label set")]
    UnknownClass { index: usize },
}

/// One emotion from the label codec's closed set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct EmotionLabel(String);

impl EmotionLabel {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable, process-wide ensemble. Share it through an `Arc`.
#[derive(Debug, Clone)]
pub struct EnsemblePredictor {
    codec: LabelCodec,
    scaler: StandardScaler,
    cnn: SequenceModel,
    lstm: SequenceModel,
    forest: RandomForest,
    meta: MetaClassifier,
}

impl EnsemblePredictor {
    /// Verify and load every artifact from `dir`.
    pub fn load_dir(dir: &Path) -> Result<Self, ModelError> {
        Self::load(&ModelArtifacts::verify(dir)?)
    }

    pub fn load(artifacts: &ModelArtifacts) -> Result<Self, ModelError> {
        let predictor = Self::from_parts(
            load_json(&artifacts.path(LABEL_ENCODER_FILE))?,
            load_json(&artifacts.path(SCALER_FILE))?,
            load_json(&artifacts.path(CNN_FILE))?,
            load_json(&artifacts.path(LSTM_FILE))?,
            load_json(&artifacts.path(RANDOM_FOREST_FILE))?,
            load_json(&artifacts.path(META_CLASSIFIER_FILE))?,
        )?;
        tracing::info!(
            dir = %artifacts.dir().display(),
            classes = predictor.codec.len(),
            meta = predictor.meta.kind(),
            "ensemble loaded"
        );
        Ok(predictor)
    }

    /// Assemble an ensemble, checking every component against the feature width and the
    /// label set.
    pub fn from_parts(
        codec: LabelCodec,
        scaler: StandardScaler,
        cnn: SequenceModel,
        lstm: SequenceModel,
        forest: RandomForest,
        meta: MetaClassifier,
    ) -> Result<Self, ModelError> {
        codec.validate().map_err(|reason| ModelError::Invalid {
            artifact: LABEL_ENCODER_FILE,
            reason,
        })?;
        let classes = codec.len();

        scaler.validate().map_err(|reason| ModelError::Invalid {
            artifact: SCALER_FILE,
            reason,
        })?;
        if scaler.dim() != FEATURE_DIM {
            return Err(ModelError::ShapeMismatch {
                artifact: SCALER_FILE,
                what: "features",
                expected: FEATURE_DIM,
                found: scaler.dim(),
            });
        }

        for (model, artifact) in [(&cnn, CNN_FILE), (&lstm, LSTM_FILE)] {
            model
                .validate(FEATURE_DIM, classes)
                .map_err(|reason| ModelError::Invalid { artifact, reason })?;
        }

        forest.validate().map_err(|reason| ModelError::Invalid {
            artifact: RANDOM_FOREST_FILE,
            reason,
        })?;
        if forest.n_features != FEATURE_DIM {
            return Err(ModelError::ShapeMismatch {
                artifact: RANDOM_FOREST_FILE,
                what: "features",
                expected: FEATURE_DIM,
                found: forest.n_features,
            });
        }
        if forest.n_classes != classes {
            return Err(ModelError::ShapeMismatch {
                artifact: RANDOM_FOREST_FILE,
                what: "classes",
                expected: classes,
                found: forest.n_classes,
            });
        }

        meta.validate(3 * classes, classes)
            .map_err(|reason| ModelError::Invalid {
                artifact: META_CLASSIFIER_FILE,
                reason,
            })?;

        Ok(Self {
            codec,
            scaler,
            cnn,
            lstm,
            forest,
            meta,
        })
    }

    pub fn classes(&self) -> &[String] {
        &self.codec.classes
    }

    pub fn feature_dim(&self) -> usize {
        self.scaler.dim()
    }

    /// Classify one feature vector.
    pub fn predict(&self, features: &FeatureVector) -> Result<EmotionLabel, PredictionError> {
        let scaled = self.scaler.transform(features.as_slice()).ok_or(
            PredictionError::Shape {
                stage: Stage::Scaler,
                expected: self.scaler.dim(),
                found: features.len(),
            },
        )?;

        let stacked = self.stack(&scaled)?;
        let index = self
            .meta
            .predict(&stacked)
            .ok_or_else(|| PredictionError::Malformed {
                stage: Stage::Meta,
                reason: format!("no class for {} stacked inputs", stacked.len()),
            })?;
        let label = self
            .codec
            .decode(index)
            .ok_or(PredictionError::UnknownClass { index })?;
        tracing::debug!(index, label, "meta-classifier decision");
        Ok(EmotionLabel(label.to_string()))
    }

    /// Base-model probabilities concatenated as CNN, LSTM, random forest.
    fn stack(&self, scaled: &[f32]) -> Result<Vec<f32>, PredictionError> {
        let classes = self.codec.len();
        let cnn = self
            .cnn
            .predict(scaled)
            .map_err(|reason| PredictionError::Malformed {
                stage: Stage::Cnn,
                reason,
            })?;
        let lstm = self
            .lstm
            .predict(scaled)
            .map_err(|reason| PredictionError::Malformed {
                stage: Stage::Lstm,
                reason,
            })?;
        let forest = self
            .forest
            .predict_proba(scaled)
            .ok_or(PredictionError::Shape {
                stage: Stage::RandomForest,
                expected: self.forest.n_features,
                found: scaled.len(),
            })?;

        let mut stacked = Vec::with_capacity(3 * classes);
        for (stage, probs) in [
            (Stage::Cnn, cnn),
            (Stage::Lstm, lstm),
            (Stage::RandomForest, forest),
        ] {
            check_distribution(stage, &probs, classes)?;
            stacked.extend(probs);
        }
        Ok(stacked)
    }
}

fn check_distribution(stage: Stage, probs: &[f32], classes: usize) -> Result<(), PredictionError> {
    if probs.len() != classes {
        return Err(PredictionError::Shape {
            stage,
            expected: classes,
            found: probs.len(),
        });
    }
    if let Some(idx) = probs.iter().position(|p| !p.is_finite()) {
        return Err(PredictionError::Malformed {
            stage,
            reason: format!("probability {idx} is not finite"),
        });
    }
    Ok(())
}
