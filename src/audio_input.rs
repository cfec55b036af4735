//! Audio file loading for scoring: decode, downmix and resample to the model rate.

use std::fs::File;
use std::path::Path;

use symphonia::core::{
    audio::SampleBuffer, codecs::DecoderOptions, errors::Error as SymphoniaError,
    formats::FormatOptions, io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
};
use tracing::debug;

use crate::error::{EmbedError, Result};

/// Interleaved `f32` samples straight from the decoder.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Decode `path` and return mono samples at `sample_rate`.
pub fn load_mono(path: &Path, sample_rate: u32) -> Result<Vec<f32>> {
    let decoded = decode_file(path)?;
    let mono = downmix_to_mono(&decoded.samples, decoded.channels);
    let out = resample_linear(&mono, decoded.sample_rate, sample_rate);
    debug!(
        path = %path.display(),
        source_rate = decoded.sample_rate,
        channels = decoded.channels,
        samples = out.len(),
        "Loaded audio"
    );
    Ok(out)
}

pub fn decode_file(path: &Path) -> Result<DecodedAudio> {
    let audio_err = |what: &str, err: &dyn std::fmt::Display| {
        EmbedError::Audio(format!("{what} for {}: {err}", path.display()))
    };
    let file = File::open(path).map_err(|source| EmbedError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(ext);
    }
    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|err| audio_err("probe failed", &err))?;
    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| EmbedError::Audio(format!("no default track in {}", path.display())))?;
    let params = track.codec_params.clone();
    let sample_rate = params
        .sample_rate
        .ok_or_else(|| EmbedError::Audio(format!("missing sample rate in {}", path.display())))?;
    let channels = params
        .channels
        .map(|channels| channels.count() as u16)
        .ok_or_else(|| EmbedError::Audio(format!("missing channel count in {}", path.display())))?;
    let mut decoder = symphonia::default::get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(|err| audio_err("no decoder", &err))?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(_)) => break,
            Err(err) => return Err(audio_err("packet read failed", &err)),
        };
        let buffer = match decoder.decode(&packet) {
            Ok(buffer) => buffer,
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(err) => return Err(audio_err("decode failed", &err)),
        };
        let spec = *buffer.spec();
        let mut interleaved = SampleBuffer::<f32>::new(buffer.capacity() as u64, spec);
        interleaved.copy_interleaved_ref(buffer);
        samples.extend_from_slice(interleaved.samples());
    }
    if samples.is_empty() {
        return Err(EmbedError::Audio(format!(
            "decoded 0 samples from {}",
            path.display()
        )));
    }
    Ok(DecodedAudio {
        samples,
        sample_rate: sample_rate.max(1),
        channels: channels.max(1),
    })
}

/// Average interleaved channels into one; non-finite samples become silence.
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().copied().map(sanitize_sample).sum::<f32>() / channels as f32)
        .collect()
}

fn sanitize_sample(sample: f32) -> f32 {
    if !sample.is_finite() {
        return 0.0;
    }
    let clamped = sample.clamp(-1.0, 1.0);
    if clamped.abs() < f32::MIN_POSITIVE {
        0.0
    } else {
        clamped
    }
}

/// Linear-interpolation resampler; good enough for a 16 kHz analysis rate.
pub fn resample_linear(samples: &[f32], input_rate: u32, output_rate: u32) -> Vec<f32> {
    let input_rate = input_rate.max(1);
    let output_rate = output_rate.max(1);
    if samples.is_empty() || input_rate == output_rate {
        return samples.to_vec();
    }
    let step = input_rate as f64 / output_rate as f64;
    let out_len = (samples.len() as f64 * output_rate as f64 / input_rate as f64)
        .round()
        .max(1.0) as usize;
    let last = samples.len() - 1;
    (0..out_len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx0 = (pos.floor() as usize).min(last);
            let idx1 = (idx0 + 1).min(last);
            let frac = (pos - idx0 as f64).clamp(0.0, 1.0) as f32;
            samples[idx0] + (samples[idx1] - samples[idx0]) * frac
        })
        .collect()
}
