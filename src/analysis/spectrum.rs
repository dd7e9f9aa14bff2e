use std::f64::consts::PI;

use rustfft::{FftPlanner, num_complex::Complex};

/// Magnitude spectrogram stored frame-major: `frames[t][bin]`, bins `0..=n_fft/2`.
#[derive(Debug, Clone)]
pub(crate) struct Spectrogram {
    pub(crate) n_fft: usize,
    pub(crate) frames: Vec<Vec<f64>>,
}

impl Spectrogram {
    pub(crate) fn bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Squared magnitudes, frame-major.
    pub(crate) fn power(&self) -> Vec<Vec<f64>> {
        self.frames
            .iter()
            .map(|frame| frame.iter().map(|m| m * m).collect())
            .collect()
    }
}

/// Periodic Hann window (DFT-even), as used for spectral analysis.
pub(crate) fn periodic_hann(size: usize) -> Vec<f64> {
    if size <= 1 {
        return vec![1.0; size];
    }
    let factor = 2.0 * PI / size as f64;
    (0..size)
        .map(|n| 0.5 - 0.5 * (n as f64 * factor).cos())
        .collect()
}

/// Number of centered frames for a signal of `len` samples.
pub(crate) fn centered_frame_count(len: usize, hop: usize) -> usize {
    1 + len / hop.max(1)
}

/// Zero-pad `samples` by `pad` on both sides.
pub(crate) fn pad_constant(samples: &[f32], pad: usize) -> Vec<f64> {
    let mut padded = vec![0.0; samples.len() + 2 * pad];
    for (slot, &sample) in padded[pad..].iter_mut().zip(samples) {
        *slot = sample as f64;
    }
    padded
}

/// Pad `samples` by `pad` on both sides, repeating the edge samples.
pub(crate) fn pad_edge(samples: &[f32], pad: usize) -> Vec<f64> {
    let first = samples.first().copied().unwrap_or(0.0) as f64;
    let last = samples.last().copied().unwrap_or(0.0) as f64;
    let mut padded = Vec::with_capacity(samples.len() + 2 * pad);
    padded.resize(pad, first);
    padded.extend(samples.iter().map(|&s| s as f64));
    padded.resize(samples.len() + 2 * pad, last);
    padded
}

/// Centered short-time Fourier transform magnitude with a periodic Hann window.
///
/// The signal is zero-padded by `n_fft / 2` on both sides so frame `t` is centered on
/// sample `t * hop`.
pub(crate) fn stft_magnitude(samples: &[f32], n_fft: usize, hop: usize) -> Spectrogram {
    let n_fft = n_fft.max(2);
    let hop = hop.max(1);
    let bins = n_fft / 2 + 1;
    let padded = pad_constant(samples, n_fft / 2);
    let window = periodic_hann(n_fft);
    let n_frames = centered_frame_count(samples.len(), hop);

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n_fft);
    let mut scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
    let mut buffer = vec![Complex::new(0.0, 0.0); n_fft];

    let mut frames = Vec::with_capacity(n_frames);
    for t in 0..n_frames {
        let start = t * hop;
        for (i, cell) in buffer.iter_mut().enumerate() {
            let sample = padded.get(start + i).copied().unwrap_or(0.0);
            *cell = Complex::new(sample * window[i], 0.0);
        }
        fft.process_with_scratch(&mut buffer, &mut scratch);
        frames.push(buffer[..bins].iter().map(|c| c.norm()).collect());
    }
    Spectrogram { n_fft, frames }
}
