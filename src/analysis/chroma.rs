//! Pitch-class energy from a magnitude spectrogram.
//!
//! Bins are mapped onto 12 Gaussian pitch-class lobes (starting at C) weighted towards
//! the middle octaves. The reference pitch is corrected by the tuning deviation
//! estimated from spectral peaks before the filterbank is built.

use super::spectrum::Spectrogram;

/// Octave around which the chroma weighting is centered.
const CENTER_OCTAVE: f64 = 5.0;
/// Gaussian half-width of the octave weighting, in octaves.
const OCTAVE_WIDTH: f64 = 2.0;
/// Peak picking range and relative threshold used for tuning estimation.
const PITCH_FMIN: f64 = 150.0;
const PITCH_FMAX: f64 = 4_000.0;
const PITCH_THRESHOLD: f64 = 0.1;
/// Histogram resolution of the tuning estimate, in fractions of a chroma bin.
const TUNING_RESOLUTION: f64 = 0.01;

/// Per-frame chroma, each frame scaled so its largest bin is 1 (silent frames stay 0).
pub(crate) fn chroma(spec: &Spectrogram, sample_rate: u32, n_chroma: usize) -> Vec<Vec<f64>> {
    let tuning = estimate_tuning(spec, sample_rate, n_chroma);
    let filterbank = chroma_filterbank(sample_rate, spec.n_fft, n_chroma, tuning);
    spec.frames
        .iter()
        .map(|frame| {
            let mut raw: Vec<f64> = filterbank
                .iter()
                .map(|row| row.iter().zip(frame).map(|(w, m)| w * m).sum())
                .collect();
            let peak = raw.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
            if peak >= f64::MIN_POSITIVE {
                for value in &mut raw {
                    *value /= peak;
                }
            }
            raw
        })
        .collect()
}

/// Octave number of `hz` relative to A440 shifted by `tuning` chroma bins (C0-ish origin).
fn hz_to_octaves(hz: f64, tuning: f64, bins_per_octave: usize) -> f64 {
    let a440 = 440.0 * 2.0_f64.powf(tuning / bins_per_octave as f64);
    (hz / (a440 / 16.0)).log2()
}

/// Chroma filterbank `[n_chroma][n_fft / 2 + 1]`.
pub(crate) fn chroma_filterbank(
    sample_rate: u32,
    n_fft: usize,
    n_chroma: usize,
    tuning: f64,
) -> Vec<Vec<f64>> {
    let n_chroma = n_chroma.max(1);
    let n_fft = n_fft.max(2);
    let chroma_f = n_chroma as f64;
    let sr = sample_rate.max(1) as f64;

    // Fractional chroma bin of every FFT bin; DC is placed 1.5 octaves below bin 1.
    let mut frq_bins = Vec::with_capacity(n_fft);
    for k in 1..n_fft {
        let hz = k as f64 * sr / n_fft as f64;
        frq_bins.push(chroma_f * hz_to_octaves(hz, tuning, n_chroma));
    }
    frq_bins.insert(0, frq_bins[0] - 1.5 * chroma_f);

    let mut bin_widths: Vec<f64> = frq_bins
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).max(1.0))
        .collect();
    bin_widths.push(1.0);

    let half = (chroma_f / 2.0).round();
    let mut weights = vec![vec![0.0_f64; n_fft]; n_chroma];
    for (c, row) in weights.iter_mut().enumerate() {
        for (k, cell) in row.iter_mut().enumerate() {
            let shifted = frq_bins[k] - c as f64 + half + 10.0 * chroma_f;
            let distance = shifted.rem_euclid(chroma_f) - half;
            *cell = (-0.5 * (2.0 * distance / bin_widths[k]).powi(2)).exp();
        }
    }

    for k in 0..n_fft {
        let norm = weights.iter().map(|row| row[k] * row[k]).sum::<f64>().sqrt();
        let octave_weight =
            (-0.5 * ((frq_bins[k] / chroma_f - CENTER_OCTAVE) / OCTAVE_WIDTH).powi(2)).exp();
        for row in weights.iter_mut() {
            if norm >= f64::MIN_POSITIVE {
                row[k] /= norm;
            }
            row[k] *= octave_weight;
        }
    }

    // Rotate so row 0 is C rather than A.
    weights.rotate_left(3 * (n_chroma / 12));
    let bins = n_fft / 2 + 1;
    for row in &mut weights {
        row.truncate(bins);
    }
    weights
}

/// Tuning deviation in fractions of a chroma bin, in `[-0.5, 0.5)`.
///
/// Interpolated spectral peaks between 150 Hz and 4 kHz whose magnitude reaches the
/// median peak magnitude vote in a histogram of their offsets from the equal-tempered
/// grid; the most populated bucket wins.
pub(crate) fn estimate_tuning(
    spec: &Spectrogram,
    sample_rate: u32,
    bins_per_octave: usize,
) -> f64 {
    let peaks = pick_peaks(spec, sample_rate);
    if peaks.is_empty() {
        return 0.0;
    }
    let threshold = median(peaks.iter().map(|&(_, magnitude)| magnitude).collect());
    let frequencies: Vec<f64> = peaks
        .into_iter()
        .filter(|&(_, magnitude)| magnitude >= threshold)
        .map(|(frequency, _)| frequency)
        .collect();
    pitch_tuning(&frequencies, bins_per_octave)
}

/// Parabolic-interpolated spectral peaks as `(frequency_hz, magnitude)` pairs.
fn pick_peaks(spec: &Spectrogram, sample_rate: u32) -> Vec<(f64, f64)> {
    let sr = sample_rate.max(1) as f64;
    let n_fft = spec.n_fft as f64;
    let fmax = PITCH_FMAX.min(sr / 2.0);
    let mut peaks = Vec::new();
    for frame in &spec.frames {
        let n = frame.len();
        if n < 3 {
            continue;
        }
        let loudest = frame.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let reference = PITCH_THRESHOLD * loudest;
        let gated: Vec<f64> = frame
            .iter()
            .map(|&m| if m > reference { m } else { 0.0 })
            .collect();
        for bin in 0..n {
            let hz = bin as f64 * sr / n_fft;
            if hz < PITCH_FMIN || hz >= fmax || !is_local_max(&gated, bin) {
                continue;
            }
            let shift = parabolic_shift(frame, bin);
            let pitch = (bin as f64 + shift) * sr / n_fft;
            if pitch <= 0.0 {
                continue;
            }
            let magnitude = frame[bin] + 0.5 * gradient(frame, bin) * shift;
            peaks.push((pitch, magnitude));
        }
    }
    peaks
}

/// Strictly above the previous value and not below the next; edges compare to themselves.
fn is_local_max(values: &[f64], idx: usize) -> bool {
    let current = values[idx];
    let prev = if idx == 0 { current } else { values[idx - 1] };
    let next = values.get(idx + 1).copied().unwrap_or(current);
    current > prev && current >= next
}

fn parabolic_shift(values: &[f64], idx: usize) -> f64 {
    if idx == 0 || idx + 1 >= values.len() {
        return 0.0;
    }
    let a = values[idx + 1] + values[idx - 1] - 2.0 * values[idx];
    let b = (values[idx + 1] - values[idx - 1]) / 2.0;
    if b.abs() >= a.abs() { 0.0 } else { -b / a }
}

fn gradient(values: &[f64], idx: usize) -> f64 {
    let n = values.len();
    if n < 2 {
        0.0
    } else if idx == 0 {
        values[1] - values[0]
    } else if idx + 1 == n {
        values[n - 1] - values[n - 2]
    } else {
        (values[idx + 1] - values[idx - 1]) / 2.0
    }
}

fn median(mut values: Vec<f64>) -> f64 {
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.is_empty() {
        0.0
    } else if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

fn pitch_tuning(frequencies: &[f64], bins_per_octave: usize) -> f64 {
    let bins_f = bins_per_octave.max(1) as f64;
    let buckets = (1.0 / TUNING_RESOLUTION).ceil() as usize;
    let mut counts = vec![0usize; buckets];
    let mut any = false;
    for &hz in frequencies.iter().filter(|&&hz| hz > 0.0) {
        any = true;
        let mut residual = (bins_f * hz_to_octaves(hz, 0.0, bins_per_octave)).rem_euclid(1.0);
        if residual >= 0.5 {
            residual -= 1.0;
        }
        let position = ((residual + 0.5) / TUNING_RESOLUTION).floor() as usize;
        counts[position.min(buckets - 1)] += 1;
    }
    if !any {
        return 0.0;
    }
    let mut best = 0usize;
    for (idx, &count) in counts.iter().enumerate() {
        if count > counts[best] {
            best = idx;
        }
    }
    -0.5 + best as f64 / buckets as f64
}
