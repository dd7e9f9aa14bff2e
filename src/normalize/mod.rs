//! Conversion of uploaded audio into the canonical waveform.
//!
//! Two paths are tried in order: the external transcoder, then in-process decoding.
//! The outcome names which path produced the file, or carries both failure reasons.
//! No partial output is left at the destination when conversion fails.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::TranscoderSettings;
use crate::scratch::{ScratchDir, non_empty_file};

mod fallback;
mod transcoder;

pub use transcoder::{TranscodeFailure, Transcoder};

/// Path that produced the canonical waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionPath {
    Transcoder,
    Library,
}

impl ConversionPath {
    pub fn as_str(self) -> &'static str {
        match self {
            ConversionPath::Transcoder => "transcoder",
            ConversionPath::Library => "library",
        }
    }
}

/// Conversion could not produce a usable canonical waveform.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// Both paths failed.
    #[error("Audio conversion failed (transcoder: {transcoder}; decoder: {decoder})")]
    Exhausted {
        transcoder: TranscodeFailure,
        decoder: String,
    },
    /// A path reported success but the destination is missing or empty.
    #[error("Conversion produced no output at {path}")]
    EmptyOutput { path: PathBuf },
}

/// Transcoder-first, library-fallback audio normalizer confined to one scratch directory.
#[derive(Debug, Clone)]
pub struct AudioNormalizer {
    transcoder: Option<Transcoder>,
    scratch: ScratchDir,
}

impl AudioNormalizer {
    pub fn new(settings: &TranscoderSettings, scratch: ScratchDir) -> Self {
        let transcoder = settings.enabled.then(|| Transcoder::new(settings));
        Self {
            transcoder,
            scratch,
        }
    }

    /// Normalizer that only uses the in-process decoder.
    pub fn library_only(scratch: ScratchDir) -> Self {
        Self {
            transcoder: None,
            scratch,
        }
    }

    pub fn transcoder_available(&self) -> bool {
        self.transcoder
            .as_ref()
            .is_some_and(|transcoder| transcoder.is_available())
    }

    /// Produce the canonical waveform for `input` at `output`.
    pub fn normalize(
        &self,
        input: &Path,
        output: &Path,
    ) -> Result<ConversionPath, ConversionError> {
        let transcoder = match self.try_transcoder(input, output) {
            Ok(()) => {
                tracing::info!(output = %output.display(), "converted with transcoder");
                return Ok(ConversionPath::Transcoder);
            }
            Err(failure) => {
                remove_partial(output);
                match failure {
                    TranscodeFailure::Disabled | TranscodeFailure::Unavailable => {
                        tracing::debug!("{failure}; using in-process decoder")
                    }
                    _ => tracing::warn!("{failure}; falling back to in-process decoder"),
                }
                failure
            }
        };

        match fallback::decode_to_canonical(input, output) {
            Ok(_) if non_empty_file(output) => {
                tracing::info!(output = %output.display(), "converted with in-process decoder");
                Ok(ConversionPath::Library)
            }
            Ok(_) => {
                remove_partial(output);
                Err(ConversionError::EmptyOutput {
                    path: output.to_path_buf(),
                })
            }
            Err(decoder) => {
                remove_partial(output);
                tracing::error!(%transcoder, %decoder, "audio conversion failed with all methods");
                Err(ConversionError::Exhausted {
                    transcoder,
                    decoder,
                })
            }
        }
    }

    fn try_transcoder(&self, input: &Path, output: &Path) -> Result<(), TranscodeFailure> {
        let transcoder = self.transcoder.as_ref().ok_or(TranscodeFailure::Disabled)?;
        let input = self.contained(input)?;
        let output = self.contained(output)?;
        if !transcoder.is_available() {
            return Err(TranscodeFailure::Unavailable);
        }
        transcoder.convert(&input, &output)?;
        if !non_empty_file(&output) {
            return Err(TranscodeFailure::EmptyOutput);
        }
        Ok(())
    }

    fn contained(&self, path: &Path) -> Result<PathBuf, TranscodeFailure> {
        self.scratch
            .resolve_inside(path)
            .ok_or_else(|| TranscodeFailure::OutsideScratch {
                path: path.to_path_buf(),
            })
    }
}

fn remove_partial(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "removed partial conversion output"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            tracing::warn!(path = %path.display(), "could not remove partial output: {err}")
        }
    }
}
