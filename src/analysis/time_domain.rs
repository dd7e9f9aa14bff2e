use super::spectrum::{centered_frame_count, pad_constant, pad_edge};

/// Magnitudes at or below this are treated as exact zeros when counting crossings.
const ZERO_CROSSING_THRESHOLD: f64 = 1e-10;

/// Per-frame zero-crossing rate over centered, edge-padded frames.
///
/// A crossing is a sign-bit change between neighbours; zeros count as positive. The
/// count is divided by the full frame length.
pub(crate) fn zero_crossing_rate(samples: &[f32], frame_length: usize, hop: usize) -> Vec<f64> {
    let frame_length = frame_length.max(1);
    let padded = pad_edge(samples, frame_length / 2);
    framed(&padded, samples.len(), frame_length, hop)
        .map(|frame| {
            let crossings = frame
                .windows(2)
                .filter(|pair| is_negative(pair[0]) != is_negative(pair[1]))
                .count();
            crossings as f64 / frame_length as f64
        })
        .collect()
}

/// Per-frame root-mean-square energy over centered, zero-padded frames.
pub(crate) fn rms(samples: &[f32], frame_length: usize, hop: usize) -> Vec<f64> {
    let frame_length = frame_length.max(1);
    let padded = pad_constant(samples, frame_length / 2);
    framed(&padded, samples.len(), frame_length, hop)
        .map(|frame| {
            let power = frame.iter().map(|x| x * x).sum::<f64>() / frame_length as f64;
            power.sqrt()
        })
        .collect()
}

fn framed<'a>(
    padded: &'a [f64],
    original_len: usize,
    frame_length: usize,
    hop: usize,
) -> impl Iterator<Item = &'a [f64]> + 'a {
    let hop = hop.max(1);
    (0..centered_frame_count(original_len, hop)).map(move |t| {
        let start = (t * hop).min(padded.len());
        let end = (start + frame_length).min(padded.len());
        &padded[start..end]
    })
}

fn is_negative(sample: f64) -> bool {
    if sample.abs() <= ZERO_CROSSING_THRESHOLD {
        false
    } else {
        sample.is_sign_negative()
    }
}
