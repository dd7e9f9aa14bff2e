use std::path::{Path, PathBuf};

use super::ModelError;

pub const LABEL_ENCODER_FILE: &str = "label_encoder.json";
pub const META_CLASSIFIER_FILE: &str = "meta_classifier.json";
pub const RANDOM_FOREST_FILE: &str = "rf_final.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const CNN_FILE: &str = "cnn_final.json";
pub const LSTM_FILE: &str = "lstm_final.json";

/// Every file the ensemble needs, in the order they are checked at startup.
pub const REQUIRED_FILES: [&str; 6] = [
    LABEL_ENCODER_FILE,
    META_CLASSIFIER_FILE,
    RANDOM_FOREST_FILE,
    SCALER_FILE,
    CNN_FILE,
    LSTM_FILE,
];

/// A model directory known to contain every required artifact.
#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    dir: PathBuf,
}

impl ModelArtifacts {
    /// Check that all required files exist, logging each one that does not.
    pub fn verify(dir: &Path) -> Result<Self, ModelError> {
        let missing: Vec<&'static str> = REQUIRED_FILES
            .iter()
            .copied()
            .filter(|name| !dir.join(name).is_file())
            .collect();
        for name in &missing {
            tracing::error!(path = %dir.join(name).display(), "required model file missing");
        }
        if !missing.is_empty() {
            return Err(ModelError::MissingArtifacts {
                dir: dir.to_path_buf(),
                missing,
            });
        }
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }
}
