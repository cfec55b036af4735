use burn::backend::NdArray;
use burn::tensor::{Tensor, TensorData};

use super::*;
use crate::config::small_test_config;

type TestBackend = NdArray;

fn ramp(batch: usize, len: usize) -> Tensor<TestBackend, 2> {
    let values: Vec<f32> = (0..batch * len).map(|v| (v % len) as f32 + 1.0).collect();
    Tensor::from_data(TensorData::new(values, [batch, len]), &Default::default())
}

fn tone(batch: usize, len: usize, sample_rate: u32, freq: f32) -> Tensor<TestBackend, 2> {
    let values: Vec<f32> = (0..batch * len)
        .map(|n| {
            let t = (n % len) as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * freq * t).sin() * 0.5
        })
        .collect();
    Tensor::from_data(TensorData::new(values, [batch, len]), &Default::default())
}

#[test]
fn seconds_round_to_nearest_sample() {
    assert_eq!(seconds_to_samples(0.02, 16_000), 320);
    assert_eq!(seconds_to_samples(1.2, 4_000), 4_800);
    assert_eq!(seconds_to_samples(-1.0, 4_000), 0);
}

#[test]
fn frame_counts_match_centered_conv_and_pool() {
    assert_eq!(cqt_frame_count(320_000, 320), 1_001);
    assert_eq!(pooled_frame_count(1_001, 4, 4), 250);
    assert_eq!(pooled_frame_count(3, 4, 4), 0);
}

#[test]
fn get_frames_covers_exact_fit() {
    let frames = get_frames(ramp(1, 10), 4, 3).unwrap();
    assert_eq!(frames.dims(), [1, 3, 4]);
    let values = frames.into_data().to_vec::<f32>().unwrap();
    assert_eq!(
        values,
        vec![1.0, 2.0, 3.0, 4.0, 4.0, 5.0, 6.0, 7.0, 7.0, 8.0, 9.0, 10.0]
    );
}

#[test]
fn get_frames_zero_pads_tail() {
    let frames = get_frames(ramp(2, 11), 4, 3).unwrap();
    assert_eq!(frames.dims(), [2, 4, 4]);
    let last = frames.narrow(1, 3, 1).reshape([2, 4]);
    let values = last.into_data().to_vec::<f32>().unwrap();
    assert_eq!(values, vec![10.0, 11.0, 0.0, 0.0, 10.0, 11.0, 0.0, 0.0]);
}

#[test]
fn get_frames_short_input_is_single_padded_frame() {
    let frames = get_frames(ramp(1, 2), 4, 2).unwrap();
    assert_eq!(frames.dims(), [1, 1, 4]);
    let values = frames.into_data().to_vec::<f32>().unwrap();
    assert_eq!(values, vec![1.0, 2.0, 0.0, 0.0]);
}

#[test]
fn get_frames_rejects_zero_hop() {
    assert!(get_frames(ramp(1, 8), 4, 0).is_err());
    assert!(get_frames(ramp(1, 8), 0, 2).is_err());
}

#[test]
fn force_length_pads_and_truncates() {
    let padded = force_length(ramp(1, 3), 5, true);
    assert_eq!(
        padded.into_data().to_vec::<f32>().unwrap(),
        vec![1.0, 2.0, 3.0, 0.0, 0.0]
    );
    let kept = force_length(ramp(1, 6), 4, true);
    assert_eq!(kept.dims(), [1, 6]);
    let cut = force_length(ramp(1, 6), 4, false);
    assert_eq!(
        cut.into_data().to_vec::<f32>().unwrap(),
        vec![1.0, 2.0, 3.0, 4.0]
    );
}

#[test]
fn prepare_produces_one_spectrogram_per_shingle() {
    let config = small_test_config();
    let device = Default::default();
    let preprocessor = Preprocessor::<TestBackend>::new(&config, &device).unwrap();

    let spec = preprocessor
        .prepare(tone(2, 4_800, 4_000, 440.0), ShingleParams::default())
        .unwrap();
    assert_eq!(spec.dims(), [2, 1, 48, 241]);

    let spec = preprocessor
        .prepare(tone(1, 9_600, 4_000, 440.0), ShingleParams::default())
        .unwrap();
    assert_eq!(spec.dims(), [1, 3, 48, 241]);
    let values = spec.into_data().to_vec::<f32>().unwrap();
    assert!(values.iter().all(|v| v.is_finite() && *v >= 0.0));
}

#[test]
fn prepare_pads_short_shingle_overrides_to_minimum_length() {
    let config = small_test_config();
    let device = Default::default();
    let preprocessor = Preprocessor::<TestBackend>::new(&config, &device).unwrap();
    let spec = preprocessor
        .prepare(tone(1, 9_600, 4_000, 440.0), ShingleParams::new(0.6, 0.3))
        .unwrap();
    assert_eq!(spec.dims(), [1, 7, 48, 241]);
}

#[test]
fn prepare_rejects_non_positive_overrides() {
    let config = small_test_config();
    let device = Default::default();
    let preprocessor = Preprocessor::<TestBackend>::new(&config, &device).unwrap();
    let params = ShingleParams {
        len: Some(0.0),
        hop: None,
    };
    assert!(preprocessor.prepare(tone(1, 4_800, 4_000, 440.0), params).is_err());
    let params = ShingleParams {
        len: None,
        hop: Some(-1.0),
    };
    assert!(preprocessor.prepare(tone(1, 4_800, 4_000, 440.0), params).is_err());
}

#[test]
fn prepare_silence_is_zero() {
    let config = small_test_config();
    let device = Default::default();
    let preprocessor = Preprocessor::<TestBackend>::new(&config, &device).unwrap();
    let silence = Tensor::<TestBackend, 2>::zeros([1, 100], &device);
    let spec = preprocessor.prepare(silence, ShingleParams::default()).unwrap();
    assert_eq!(spec.dims(), [1, 1, 48, 241]);
    let values = spec.into_data().to_vec::<f32>().unwrap();
    assert!(values.iter().all(|v| *v == 0.0));
}
