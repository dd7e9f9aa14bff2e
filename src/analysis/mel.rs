use std::f64::consts::PI;

const SLANEY_F_SP: f64 = 200.0 / 3.0;
const SLANEY_MIN_LOG_HZ: f64 = 1_000.0;
const SLANEY_MIN_LOG_MEL: f64 = SLANEY_MIN_LOG_HZ / SLANEY_F_SP;

/// Floor applied before taking logarithms of power values.
const DB_AMIN: f64 = 1e-10;
/// Dynamic range kept below the loudest cell, in decibels.
const DB_TOP: f64 = 80.0;

fn slaney_log_step() -> f64 {
    6.4_f64.ln() / 27.0
}

/// Slaney-style (auditory toolbox) hertz to mel: linear below 1 kHz, logarithmic above.
pub(crate) fn hz_to_mel(hz: f64) -> f64 {
    if hz >= SLANEY_MIN_LOG_HZ {
        SLANEY_MIN_LOG_MEL + (hz / SLANEY_MIN_LOG_HZ).ln() / slaney_log_step()
    } else {
        hz / SLANEY_F_SP
    }
}

pub(crate) fn mel_to_hz(mel: f64) -> f64 {
    if mel >= SLANEY_MIN_LOG_MEL {
        SLANEY_MIN_LOG_HZ * (slaney_log_step() * (mel - SLANEY_MIN_LOG_MEL)).exp()
    } else {
        SLANEY_F_SP * mel
    }
}

/// Triangular mel filterbank with Slaney area normalization.
pub(crate) struct MelFilterbank {
    /// `weights[band][bin]`, bins `0..=n_fft/2`.
    weights: Vec<Vec<f64>>,
}

impl MelFilterbank {
    pub(crate) fn new(
        sample_rate: u32,
        n_fft: usize,
        n_mels: usize,
        f_min: f64,
        f_max: f64,
    ) -> Self {
        let bins = n_fft / 2 + 1;
        let sr = sample_rate.max(1) as f64;
        let fft_freqs: Vec<f64> = (0..bins)
            .map(|k| k as f64 * sr / n_fft.max(1) as f64)
            .collect();
        let mel_min = hz_to_mel(f_min);
        let mel_max = hz_to_mel(f_max);
        let points = n_mels + 2;
        let mel_f: Vec<f64> = (0..points)
            .map(|i| {
                let t = i as f64 / (points - 1) as f64;
                mel_to_hz(mel_min + (mel_max - mel_min) * t)
            })
            .collect();

        let weights = (0..n_mels)
            .map(|m| {
                let lower_width = mel_f[m + 1] - mel_f[m];
                let upper_width = mel_f[m + 2] - mel_f[m + 1];
                let enorm = 2.0 / (mel_f[m + 2] - mel_f[m]);
                fft_freqs
                    .iter()
                    .map(|&freq| {
                        let lower = (freq - mel_f[m]) / lower_width;
                        let upper = (mel_f[m + 2] - freq) / upper_width;
                        lower.min(upper).max(0.0) * enorm
                    })
                    .collect()
            })
            .collect();
        Self { weights }
    }

    pub(crate) fn bands(&self) -> usize {
        self.weights.len()
    }

    /// Project one power frame onto the mel bands.
    pub(crate) fn apply(&self, power: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .map(|band| band.iter().zip(power).map(|(w, p)| w * p).sum())
            .collect()
    }
}

/// Convert a power spectrogram to decibels relative to 1.0, clipped to `DB_TOP` below
/// the global maximum.
pub(crate) fn power_to_db(frames: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let mut db: Vec<Vec<f64>> = frames
        .iter()
        .map(|frame| frame.iter().map(|&p| 10.0 * p.max(DB_AMIN).log10()).collect())
        .collect();
    let max = db
        .iter()
        .flatten()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    let floor = max - DB_TOP;
    for value in db.iter_mut().flatten() {
        *value = value.max(floor);
    }
    db
}

/// Orthonormal DCT-II basis truncated to `n_out` coefficients: `basis[k][n]`.
pub(crate) fn dct_ortho_basis(n_in: usize, n_out: usize) -> Vec<Vec<f64>> {
    let n = n_in.max(1) as f64;
    (0..n_out)
        .map(|k| {
            let scale = if k == 0 {
                (1.0 / n).sqrt()
            } else {
                (2.0 / n).sqrt()
            };
            (0..n_in)
                .map(|i| scale * (PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n)).cos())
                .collect()
        })
        .collect()
}

/// Cepstral coefficients per frame from a mel power spectrogram.
pub(crate) fn mfcc(mel_power: &[Vec<f64>], n_mfcc: usize) -> Vec<Vec<f64>> {
    let log_mel = power_to_db(mel_power);
    let n_mels = log_mel.first().map_or(0, Vec::len);
    let basis = dct_ortho_basis(n_mels, n_mfcc);
    log_mel
        .iter()
        .map(|frame| {
            basis
                .iter()
                .map(|row| row.iter().zip(frame).map(|(b, v)| b * v).sum())
                .collect()
        })
        .collect()
}
