//! Request orchestration: validation, scratch lifecycle, conversion, extraction, prediction.
//!
//! [`EmotionPipeline`] is cheap to share across threads. The only shared state is the
//! frozen [`EnsemblePredictor`] behind an `Arc`; every request owns its scratch files
//! and drops them on every exit path.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::Serialize;

use crate::analysis::extract_features;
use crate::config::PipelineSettings;
use crate::ml::{EmotionLabel, EnsemblePredictor, ModelArtifacts};
use crate::normalize::{AudioNormalizer, ConversionError};
use crate::scratch::{ScratchDir, ScratchRequest, non_empty_file};
use crate::upload::{ALLOWED_EXTENSIONS, FormatValidator, UploadedAudio};

mod errors;

pub use errors::{ErrorCategory, PipelineError, StartupError};

/// Serializable health summary.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PipelineStatus {
    pub status: &'static str,
    pub transcoder_available: bool,
    pub max_file_size_mb: u64,
    pub allowed_formats: Vec<&'static str>,
}

/// Shared entry point that turns an upload into an emotion label.
#[derive(Debug, Clone)]
pub struct EmotionPipeline {
    validator: FormatValidator,
    normalizer: AudioNormalizer,
    scratch: ScratchDir,
    predictor: Arc<EnsemblePredictor>,
}

impl EmotionPipeline {
    /// Assemble a pipeline around an already loaded predictor.
    pub fn new(
        settings: &PipelineSettings,
        predictor: Arc<EnsemblePredictor>,
    ) -> Result<Self, StartupError> {
        let scratch = ScratchDir::open(&settings.scratch_dir()?)?;
        let normalizer = AudioNormalizer::new(&settings.transcoder, scratch.clone());
        Ok(Self {
            validator: FormatValidator::new(settings.max_upload_bytes),
            normalizer,
            scratch,
            predictor,
        })
    }

    /// Verify and load the model directory named by `settings`, then assemble the pipeline.
    pub fn from_settings(settings: &PipelineSettings) -> Result<Self, StartupError> {
        let artifacts = ModelArtifacts::verify(&settings.model_dir()?)?;
        let predictor = Arc::new(EnsemblePredictor::load(&artifacts)?);
        let pipeline = Self::new(settings, predictor)?;
        if pipeline.normalizer.transcoder_available() {
            tracing::info!("transcoder available");
        } else {
            tracing::warn!("transcoder not available; using the in-process decoder only");
        }
        Ok(pipeline)
    }

    pub fn predictor(&self) -> &Arc<EnsemblePredictor> {
        &self.predictor
    }

    pub fn scratch(&self) -> &ScratchDir {
        &self.scratch
    }

    /// Classify one upload. Scratch files are removed before this returns.
    pub fn classify(&self, upload: UploadedAudio) -> Result<EmotionLabel, PipelineError> {
        let extension = self.validator.validate_upload(&upload).map_err(|err| {
            tracing::warn!(filename = ?upload.filename(), "upload rejected: {err}");
            err
        })?;
        let request = self.scratch.allocate(extension);
        let span = tracing::info_span!("request", id = %request.id());
        let _entered = span.enter();
        tracing::info!(
            filename = ?upload.filename(),
            bytes = upload.bytes().len(),
            "processing upload"
        );

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.run(&request, upload.into_bytes())
        }));
        let result = match outcome {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!("pipeline stage panicked: {message}");
                Err(PipelineError::Panicked(message))
            }
        };
        drop(request);
        result
    }

    /// Report health in the shape the transport layer exposes.
    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            status: "healthy",
            transcoder_available: self.normalizer.transcoder_available(),
            max_file_size_mb: self.validator.max_bytes() / (1024 * 1024),
            allowed_formats: ALLOWED_EXTENSIONS.to_vec(),
        }
    }

    /// Remove anything left in the scratch directory. Returns the number of files removed.
    pub fn shutdown(&self) -> usize {
        let removed = self.scratch.sweep();
        tracing::info!(removed, "scratch directory swept");
        removed
    }

    fn run(
        &self,
        request: &ScratchRequest,
        bytes: Vec<u8>,
    ) -> Result<EmotionLabel, PipelineError> {
        request.write_original(&bytes).map_err(|err| {
            tracing::error!("failed to persist upload: {err}");
            err
        })?;
        drop(bytes);
        tracing::info!(path = %request.original_path().display(), "upload saved");

        let converted = request.converted_path();
        let path = self.normalizer.normalize(request.original_path(), converted)?;
        if !non_empty_file(converted) {
            tracing::error!("conversion left no canonical waveform");
            return Err(ConversionError::EmptyOutput {
                path: converted.to_path_buf(),
            }
            .into());
        }
        tracing::info!(via = path.as_str(), "audio normalized");

        let features = extract_features(converted).map_err(|err| {
            tracing::error!("feature extraction failed: {err}");
            err
        })?;
        tracing::info!(dims = features.len(), "features extracted");

        let label = self.predictor.predict(&features).map_err(|err| {
            tracing::error!("prediction failed: {err}");
            err
        })?;
        tracing::info!(emotion = %label, "prediction complete");
        Ok(label)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}
