use std::io::BufWriter;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use super::{
    CANONICAL_BITS_PER_SAMPLE, CANONICAL_CHANNELS, CANONICAL_SAMPLE_RATE, downmix_to_mono,
};

/// WAV header of the canonical waveform.
pub fn canonical_spec() -> WavSpec {
    WavSpec {
        channels: CANONICAL_CHANNELS,
        sample_rate: CANONICAL_SAMPLE_RATE,
        bits_per_sample: CANONICAL_BITS_PER_SAMPLE,
        sample_format: SampleFormat::Int,
    }
}

pub fn is_canonical(spec: &WavSpec) -> bool {
    *spec == canonical_spec()
}

/// Read only the WAV header.
pub fn read_spec(path: &Path) -> Result<WavSpec, String> {
    WavReader::open(path)
        .map(|reader| reader.spec())
        .map_err(|err| format!("WAV header read failed for {}: {err}", path.display()))
}

/// Write mono samples at the canonical rate as 16-bit PCM.
///
/// The data goes to a temp file next to `path` which is renamed into place only after
/// the header is finalized, so a failed write never leaves a truncated WAV behind.
pub fn write_canonical_wav(path: &Path, mono: &[f32]) -> Result<(), String> {
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(".canonical_")
        .suffix(".wav")
        .tempfile_in(dir)
        .map_err(|err| format!("Temp file in {} failed: {err}", dir.display()))?;
    {
        let mut writer = WavWriter::new(BufWriter::new(tmp.as_file_mut()), canonical_spec())
            .map_err(|err| format!("WAV writer init failed: {err}"))?;
        for &sample in mono {
            writer
                .write_sample(to_pcm16(sample))
                .map_err(|err| format!("WAV write failed: {err}"))?;
        }
        writer
            .finalize()
            .map_err(|err| format!("WAV finalize failed: {err}"))?;
    }
    tmp.persist(path)
        .map(|_| ())
        .map_err(|err| format!("Persist to {} failed: {}", path.display(), err.error))
}

/// Decode a window of a WAV file to mono `f32`, returning the samples and their rate.
///
/// `offset_seconds` worth of frames are skipped, then at most `duration_seconds` are
/// read. Both frame counts truncate toward zero.
pub fn read_wav_window(
    path: &Path,
    offset_seconds: f64,
    duration_seconds: f64,
) -> Result<(Vec<f32>, u32), String> {
    let mut reader = WavReader::open(path)
        .map_err(|err| format!("WAV open failed for {}: {err}", path.display()))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;
    let rate = spec.sample_rate.max(1);
    let skip = seconds_to_frames(offset_seconds, rate) * channels;
    let take = seconds_to_frames(duration_seconds, rate) * channels;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .skip(skip)
            .take(take)
            .collect::<Result<_, _>>(),
        SampleFormat::Int => {
            let scale = 1.0 / (1_i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .samples::<i32>()
                .skip(skip)
                .take(take)
                .map(|sample| sample.map(|value| value as f32 * scale))
                .collect::<Result<_, _>>()
        }
    }
    .map_err(|err| format!("WAV sample read failed for {}: {err}", path.display()))?;

    Ok((downmix_to_mono(&interleaved, spec.channels), rate))
}

fn seconds_to_frames(seconds: f64, rate: u32) -> usize {
    (seconds.max(0.0) * rate as f64) as usize
}

fn to_pcm16(sample: f32) -> i16 {
    let sample = if sample.is_finite() { sample } else { 0.0 };
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn written_file_has_canonical_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.wav");
        write_canonical_wav(&path, &[0.0, 0.5, -0.5, 1.5]).unwrap();
        let spec = read_spec(&path).unwrap();
        assert!(is_canonical(&spec));
        let reader = WavReader::open(&path).unwrap();
        assert_eq!(reader.duration(), 4);
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(".canonical_"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn pcm16_conversion_clamps_and_rounds() {
        assert_eq!(to_pcm16(1.5), i16::MAX);
        assert_eq!(to_pcm16(-2.0), -i16::MAX);
        assert_eq!(to_pcm16(f32::NAN), 0);
        assert_eq!(to_pcm16(0.5), 16_384);
    }

    #[test]
    fn window_skips_offset_and_caps_duration() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ramp.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 100,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for i in 0..500_i16 {
            writer.write_sample(i * 10).unwrap();
        }
        writer.finalize().unwrap();

        let (mono, rate) = read_wav_window(&path, 0.6, 2.5).unwrap();
        assert_eq!(rate, 100);
        assert_eq!(mono.len(), 250);
        assert!((mono[0] - 600.0 / 32_768.0).abs() < 1e-6);

        let (tail, _) = read_wav_window(&path, 4.0, 2.5).unwrap();
        assert_eq!(tail.len(), 100);

        let (beyond, _) = read_wav_window(&path, 6.0, 2.5).unwrap();
        assert!(beyond.is_empty());
    }

    #[test]
    fn window_downmixes_stereo() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 10,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for _ in 0..20 {
            writer.write_sample(0.5_f32).unwrap();
            writer.write_sample(-0.1_f32).unwrap();
        }
        writer.finalize().unwrap();
        let (mono, _) = read_wav_window(&path, 0.0, 1.0).unwrap();
        assert_eq!(mono.len(), 10);
        assert!(mono.iter().all(|&v| (v - 0.2).abs() < 1e-6));
    }
}
