use serde::{Deserialize, Serialize};

/// Per-dimension standardization fitted on the training set: `(x - mean) / scale`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    /// Standard deviations; zero entries are treated as 1 (constant features).
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Validate structural invariants of the scaler.
    pub fn validate(&self) -> Result<(), String> {
        if self.mean.is_empty() {
            return Err("mean is empty".to_string());
        }
        if self.mean.len() != self.scale.len() {
            return Err(format!(
                "mean has {} entries but scale has {}",
                self.mean.len(),
                self.scale.len()
            ));
        }
        if let Some(idx) = self.mean.iter().position(|v| !v.is_finite()) {
            return Err(format!("mean[{idx}] is not finite"));
        }
        if let Some(idx) = self
            .scale
            .iter()
            .position(|v| !v.is_finite() || *v < 0.0)
        {
            return Err(format!("scale[{idx}] must be finite and non-negative"));
        }
        Ok(())
    }

    /// Number of input dimensions.
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Standardize one row. Returns `None` when the row length does not match.
    pub fn transform(&self, features: &[f32]) -> Option<Vec<f32>> {
        if features.len() != self.dim() {
            return None;
        }
        Some(
            features
                .iter()
                .zip(self.mean.iter().zip(&self.scale))
                .map(|(&x, (&mean, &scale))| {
                    let scale = if scale == 0.0 { 1.0 } else { scale };
                    ((x as f64 - mean) / scale) as f32
                })
                .collect(),
        )
    }
}
