//! In-process decoding used when the external transcoder cannot produce the file.

use std::path::Path;

use crate::codec::{
    CANONICAL_SAMPLE_RATE, decode_audio, downmix_to_mono, resample_linear, write_canonical_wav,
};

/// Decode `input` in-process and write it as the canonical waveform at `output`.
///
/// Returns the number of frames written.
pub(crate) fn decode_to_canonical(input: &Path, output: &Path) -> Result<usize, String> {
    let decoded = decode_audio(input)?;
    let mono = downmix_to_mono(&decoded.samples, decoded.channels);
    let mono = if decoded.sample_rate == CANONICAL_SAMPLE_RATE {
        mono
    } else {
        resample_linear(&mono, decoded.sample_rate, CANONICAL_SAMPLE_RATE)
    };
    if mono.is_empty() {
        return Err(format!("{} decoded to no samples", input.display()));
    }
    write_canonical_wav(output, &mono)?;
    tracing::debug!(
        frames = mono.len(),
        source_rate = decoded.sample_rate,
        source_channels = decoded.channels,
        "decoded with the in-process fallback"
    );
    Ok(mono.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{is_canonical, read_spec};
    use hound::{SampleFormat, WavSpec, WavWriter};
    use tempfile::tempdir;

    #[test]
    fn stereo_48k_becomes_canonical_mono() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 48_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&input, spec).unwrap();
        for i in 0..48_000 {
            let v = ((i as f32 * 0.05).sin() * 10_000.0) as i16;
            writer.write_sample(v).unwrap();
            writer.write_sample(v).unwrap();
        }
        writer.finalize().unwrap();

        let output = dir.path().join("out.wav");
        let frames = decode_to_canonical(&input, &output).unwrap();
        assert_eq!(frames, CANONICAL_SAMPLE_RATE as usize);
        assert!(is_canonical(&read_spec(&output).unwrap()));
    }

    #[test]
    fn garbage_input_fails_without_output() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("bad.wav");
        std::fs::write(&input, b"RIFF not really a wave file at all").unwrap();
        let output = dir.path().join("out.wav");
        assert!(decode_to_canonical(&input, &output).is_err());
        assert!(!output.exists());
    }
}
