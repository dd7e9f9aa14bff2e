//! Fixed-length acoustic feature vectors from canonical waveforms.
//!
//! A bounded window of the waveform (skip [`OFFSET_SECONDS`], keep at most
//! [`DURATION_SECONDS`]) is summarized by five time-averaged descriptors, concatenated in
//! this order:
//!
//! | descriptor          | values |
//! |---------------------|--------|
//! | zero-crossing rate  | 1      |
//! | chroma              | 12     |
//! | MFCC                | 20     |
//! | RMS energy          | 1      |
//! | mel power           | 128    |
//!
//! All frame-based descriptors share the same centered framing (`N_FFT` window, `HOP`
//! hop) so they cover identical frames.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::{CANONICAL_SAMPLE_RATE, read_wav_window, resample_linear};

mod chroma;
mod mel;
mod spectrum;
mod time_domain;

/// Sample rate all descriptors are computed at.
pub const SAMPLE_RATE: u32 = CANONICAL_SAMPLE_RATE;
/// Seconds skipped at the start of every clip.
pub const OFFSET_SECONDS: f64 = 0.6;
/// Maximum seconds analyzed after the offset.
pub const DURATION_SECONDS: f64 = 2.5;
pub const N_FFT: usize = 2048;
pub const HOP: usize = 512;
pub const N_CHROMA: usize = 12;
pub const N_MFCC: usize = 20;
pub const N_MELS: usize = 128;
/// Length of every [`FeatureVector`].
pub const FEATURE_DIM: usize = 1 + N_CHROMA + N_MFCC + 1 + N_MELS;

/// Errors raised while turning a waveform into features.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The waveform file could not be opened or decoded.
    #[error("Failed to read waveform {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },
    /// Nothing was left after applying the analysis window.
    #[error("No audio in the analysis window")]
    EmptyWindow,
    /// A descriptor produced NaN or infinity.
    #[error("Feature {index} is not finite")]
    NonFinite { index: usize },
}

/// Time-averaged descriptor vector of length [`FEATURE_DIM`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.0
    }
}

impl From<Vec<f32>> for FeatureVector {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

impl From<FeatureVector> for Vec<f32> {
    fn from(value: FeatureVector) -> Self {
        value.0
    }
}

/// Load the analysis window of a canonical waveform and compute its features.
///
/// Files at another rate are resampled to [`SAMPLE_RATE`]; multichannel files are
/// averaged to mono.
pub fn extract_features(path: &Path) -> Result<FeatureVector, ExtractionError> {
    let (samples, rate) =
        read_wav_window(path, OFFSET_SECONDS, DURATION_SECONDS).map_err(|reason| {
            ExtractionError::Unreadable {
                path: path.to_path_buf(),
                reason,
            }
        })?;
    let samples = if rate == SAMPLE_RATE {
        samples
    } else {
        tracing::debug!(rate, "resampling analysis window to {SAMPLE_RATE} Hz");
        resample_linear(&samples, rate, SAMPLE_RATE)
    };
    extract_from_samples(&samples)
}

/// Compute features for mono samples already at [`SAMPLE_RATE`].
pub fn extract_from_samples(samples: &[f32]) -> Result<FeatureVector, ExtractionError> {
    if samples.is_empty() {
        return Err(ExtractionError::EmptyWindow);
    }
    let spectrogram = spectrum::stft_magnitude(samples, N_FFT, HOP);
    let power = spectrogram.power();
    let nyquist = SAMPLE_RATE as f64 / 2.0;
    let mel_bank = mel::MelFilterbank::new(SAMPLE_RATE, N_FFT, N_MELS, 0.0, nyquist);
    let mel_power: Vec<Vec<f64>> = power.iter().map(|frame| mel_bank.apply(frame)).collect();

    let zcr = time_domain::zero_crossing_rate(samples, N_FFT, HOP);
    let chroma = chroma::chroma(&spectrogram, SAMPLE_RATE, N_CHROMA);
    let mfcc = mel::mfcc(&mel_power, N_MFCC);
    let rms = time_domain::rms(samples, N_FFT, HOP);

    let mut values = Vec::with_capacity(FEATURE_DIM);
    values.push(mean(&zcr) as f32);
    values.extend(column_means(&chroma, N_CHROMA));
    values.extend(column_means(&mfcc, N_MFCC));
    values.push(mean(&rms) as f32);
    values.extend(column_means(&mel_power, N_MELS));

    if let Some(index) = values.iter().position(|v| !v.is_finite()) {
        return Err(ExtractionError::NonFinite { index });
    }
    debug_assert_eq!(values.len(), FEATURE_DIM);
    Ok(FeatureVector(values))
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Average frame-major rows into one value per column.
fn column_means(frames: &[Vec<f64>], width: usize) -> impl Iterator<Item = f32> + '_ {
    let count = frames.len().max(1) as f64;
    (0..width).map(move |col| {
        let sum: f64 = frames
            .iter()
            .map(|frame| frame.get(col).copied().unwrap_or(0.0))
            .sum();
        (sum / count) as f32
    })
}
