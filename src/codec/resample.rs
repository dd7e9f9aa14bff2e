/// Resample mono samples using linear interpolation.
pub fn resample_linear(samples: &[f32], input_rate: u32, output_rate: u32) -> Vec<f32> {
    let input_rate = input_rate.max(1);
    let output_rate = output_rate.max(1);
    if samples.is_empty() || input_rate == output_rate {
        return samples.to_vec();
    }
    let out_len = (samples.len() as u64 * output_rate as u64).div_ceil(input_rate as u64) as usize;
    let step = input_rate as f64 / output_rate as f64;
    (0..out_len.max(1))
        .map(|i| interpolate(samples, i as f64 * step))
        .collect()
}

fn interpolate(samples: &[f32], pos: f64) -> f32 {
    let last = samples.len() - 1;
    let idx0 = (pos.floor().max(0.0) as usize).min(last);
    let idx1 = (idx0 + 1).min(last);
    let frac = (pos - idx0 as f64).clamp(0.0, 1.0) as f32;
    let a = samples[idx0];
    a + (samples[idx1] - a) * frac
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsampling_interpolates_between_neighbours() {
        let out = resample_linear(&[0.0, 1.0], 1, 2);
        assert_eq!(out.len(), 4);
        assert!((out[0] - 0.0).abs() < 1e-6);
        assert!((out[1] - 0.5).abs() < 1e-6);
        assert!((out[3] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn output_length_tracks_duration() {
        let one_second = vec![0.25_f32; 44_100];
        let out = resample_linear(&one_second, 44_100, 22_050);
        assert_eq!(out.len(), 22_050);
        assert!(out.iter().all(|&v| (v - 0.25).abs() < 1e-6));
    }

    #[test]
    fn identical_rates_are_passthrough() {
        let input = vec![0.1_f32, -0.2, 0.3];
        assert_eq!(resample_linear(&input, 22_050, 22_050), input);
    }
}
