//! Stacking classifier applied to the concatenated base-model probabilities.

use serde::{Deserialize, Serialize};

use super::argmax;
use super::forest::RandomForest;

/// Second-level classifier mapping stacked probabilities to a class index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetaClassifier {
    /// Linear model; `coef` is `[n_classes][n_inputs]`, or a single row for the binary case.
    LogisticRegression {
        coef: Vec<Vec<f64>>,
        intercept: Vec<f64>,
    },
    RandomForest(RandomForest),
}

impl MetaClassifier {
    /// Validate the classifier against the expected input width and class count.
    pub fn validate(&self, n_inputs: usize, n_classes: usize) -> Result<(), String> {
        match self {
            Self::LogisticRegression { coef, intercept } => {
                let rows = if n_classes == 2 && coef.len() == 1 {
                    1
                } else {
                    n_classes
                };
                if coef.len() != rows {
                    return Err(format!("coef has {} rows, expected {rows}", coef.len()));
                }
                if intercept.len() != rows {
                    return Err(format!(
                        "intercept has {} entries, expected {rows}",
                        intercept.len()
                    ));
                }
                if let Some(idx) = coef.iter().position(|row| row.len() != n_inputs) {
                    return Err(format!("coef row {idx} does not have {n_inputs} inputs"));
                }
                if coef.iter().flatten().chain(intercept).any(|v| !v.is_finite()) {
                    return Err("coefficients must be finite".to_string());
                }
                Ok(())
            }
            Self::RandomForest(forest) => {
                forest.validate()?;
                if forest.n_features != n_inputs {
                    return Err(format!(
                        "forest expects {} inputs, expected {n_inputs}",
                        forest.n_features
                    ));
                }
                if forest.n_classes != n_classes {
                    return Err(format!(
                        "forest has {} classes, expected {n_classes}",
                        forest.n_classes
                    ));
                }
                Ok(())
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::LogisticRegression { .. } => "logistic_regression",
            Self::RandomForest(_) => "random_forest",
        }
    }

    /// Predict a class index, or `None` when the input is malformed.
    pub fn predict(&self, inputs: &[f32]) -> Option<usize> {
        match self {
            Self::LogisticRegression { coef, intercept } => {
                if coef.first().is_none_or(|row| row.len() != inputs.len()) {
                    return None;
                }
                let scores: Vec<f32> = coef
                    .iter()
                    .zip(intercept)
                    .map(|(row, bias)| {
                        let dot: f64 = row.iter().zip(inputs).map(|(w, &x)| w * x as f64).sum();
                        (dot + bias) as f32
                    })
                    .collect();
                if let [score] = scores.as_slice() {
                    return (!score.is_nan()).then_some(usize::from(*score > 0.0));
                }
                argmax(&scores)
            }
            Self::RandomForest(forest) => forest.predict_proba(inputs).and_then(|p| argmax(&p)),
        }
    }
}
