//! Audio decoding and canonical waveform IO shared by normalization and analysis.

mod canonical;
mod decode;
mod resample;

/// Sample rate of the canonical waveform.
pub const CANONICAL_SAMPLE_RATE: u32 = 22_050;
/// Channel count of the canonical waveform.
pub const CANONICAL_CHANNELS: u16 = 1;
/// Bit depth of the canonical waveform (signed linear PCM).
pub const CANONICAL_BITS_PER_SAMPLE: u16 = 16;

pub use canonical::{canonical_spec, is_canonical, read_spec, read_wav_window, write_canonical_wav};
pub use decode::{DecodedAudio, decode_audio};
pub use resample::resample_linear;

/// Average interleaved frames down to one channel, zeroing non-finite samples.
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    if channels == 1 {
        return samples.iter().copied().map(sanitize_sample).collect();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().copied().map(sanitize_sample).sum::<f32>() / channels as f32)
        .collect()
}

fn sanitize_sample(sample: f32) -> f32 {
    if sample.is_finite() {
        sample.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}
