//! Library exports for the binary, benchmarks and tests.
/// Acoustic feature extraction.
pub mod analysis;
/// Application directory helpers.
pub mod app_dirs;
/// Audio decoding, resampling and canonical WAV I/O.
pub mod codec;
/// Pipeline configuration.
pub mod config;
/// Logging setup.
pub mod logging;
/// Frozen ensemble classifiers.
pub mod ml;
/// Transcoder-first audio normalization.
pub mod normalize;
/// Request orchestration.
pub mod pipeline;
/// Per-request scratch files.
pub mod scratch;
/// Upload payloads and format validation.
pub mod upload;

pub use pipeline::{EmotionPipeline, PipelineError, PipelineStatus};
pub use upload::UploadedAudio;
