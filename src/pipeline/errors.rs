use thiserror::Error;

use crate::analysis::ExtractionError;
use crate::config::ConfigError;
use crate::ml::{ModelError, PredictionError};
use crate::normalize::ConversionError;
use crate::scratch::ScratchError;
use crate::upload::ValidationError;

/// Coarse classification of a request failure, used to pick the caller-facing response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Conversion,
    Extraction,
    Prediction,
    Internal,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Validation => "validation",
            ErrorCategory::Conversion => "conversion",
            ErrorCategory::Extraction => "extraction",
            ErrorCategory::Prediction => "prediction",
            ErrorCategory::Internal => "internal",
        }
    }
}

/// Terminal failure of one classification request.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error("Emotion prediction failed: {0}")]
    Prediction(#[from] PredictionError),
    #[error(transparent)]
    Scratch(#[from] ScratchError),
    #[error("A pipeline stage panicked: {0}")]
    Panicked(String),
}

impl PipelineError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            PipelineError::Validation(_) => ErrorCategory::Validation,
            PipelineError::Conversion(_) => ErrorCategory::Conversion,
            PipelineError::Extraction(_) => ErrorCategory::Extraction,
            PipelineError::Prediction(_) => ErrorCategory::Prediction,
            PipelineError::Scratch(_) | PipelineError::Panicked(_) => ErrorCategory::Internal,
        }
    }

    /// Message safe to show the caller. Only validation failures carry detail.
    pub fn public_message(&self) -> String {
        match self {
            PipelineError::Validation(err) => err.to_string(),
            PipelineError::Conversion(_) => {
                "Could not process audio file. Please ensure it's a valid audio format.".to_string()
            }
            PipelineError::Extraction(_) => "Could not extract audio features".to_string(),
            PipelineError::Prediction(_) => "Emotion prediction failed".to_string(),
            PipelineError::Scratch(_) | PipelineError::Panicked(_) => {
                "Internal server error occurred".to_string()
            }
        }
    }

    /// HTTP-style status for the transport collaborator.
    pub fn status_code(&self) -> u16 {
        match self {
            PipelineError::Validation(ValidationError::TooLarge { .. }) => 413,
            PipelineError::Validation(_) => 400,
            PipelineError::Conversion(_) | PipelineError::Extraction(_) => 422,
            PipelineError::Prediction(_)
            | PipelineError::Scratch(_)
            | PipelineError::Panicked(_) => 500,
        }
    }
}

/// Failure to bring the pipeline up.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Scratch(#[from] ScratchError),
    #[error(transparent)]
    Model(#[from] ModelError),
}
