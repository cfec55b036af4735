use std::path::Path;

/// Write a mono float WAV holding a sine at `freq` Hz.
pub fn write_tone_wav(path: &Path, sample_rate: u32, seconds: f32, freq: f32) {
    let len = (seconds * sample_rate as f32).round() as usize;
    let samples: Vec<f32> = (0..len)
        .map(|n| {
            let t = n as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * freq * t).sin() * 0.5
        })
        .collect();
    write_wav(path, sample_rate, &samples);
}

pub fn write_wav(path: &Path, sample_rate: u32, samples: &[f32]) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create wav parent dirs");
    }
    let mut writer = hound::WavWriter::create(path, spec).expect("create wav writer");
    for &sample in samples {
        writer.write_sample(sample).expect("write wav sample");
    }
    writer.finalize().expect("finalize wav");
}
