use std::path::Path;

/// Write a 16-bit PCM tone mixing two partials, `seconds` long.
pub fn write_tone_wav(path: &Path, sample_rate: u32, channels: u16, seconds: f32) {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create wav parent dirs");
    }
    let mut writer = hound::WavWriter::create(path, spec).expect("create wav writer");
    let frames = (sample_rate as f32 * seconds) as usize;
    for i in 0..frames {
        let t = i as f32 / sample_rate as f32;
        let value = 0.4 * (2.0 * std::f32::consts::PI * 220.0 * t).sin()
            + 0.2 * (2.0 * std::f32::consts::PI * 660.0 * t).sin();
        let sample = (value * i16::MAX as f32) as i16;
        for _ in 0..channels {
            writer.write_sample(sample).expect("write wav sample");
        }
    }
    writer.finalize().expect("finalize wav");
}

/// In-memory WAV bytes for a tone, as an upload would carry them.
pub fn tone_wav_bytes(sample_rate: u32, channels: u16, seconds: f32) -> Vec<u8> {
    let dir = tempfile::tempdir().expect("create tempdir");
    let path = dir.path().join("tone.wav");
    write_tone_wav(&path, sample_rate, channels, seconds);
    std::fs::read(&path).expect("read wav bytes")
}
