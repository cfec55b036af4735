use burn::nn::pool::{AvgPool1d, AvgPool1dConfig};
use burn::tensor::Tensor;
use burn::tensor::backend::Backend;
use tracing::debug;

use super::cqt::{CqtKernels, CqtTransform};
use super::framing::{force_length, get_frames};
use super::seconds_to_samples;
use crate::config::ModelConfig;
use crate::error::{EmbedError, Result};

/// Per-call overrides of the configured shingle length and hop, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ShingleParams {
    pub len: Option<f32>,
    pub hop: Option<f32>,
}

impl ShingleParams {
    pub fn new(len: f32, hop: f32) -> Self {
        Self {
            len: Some(len),
            hop: Some(hop),
        }
    }
}

/// Turns batches of waveforms into pooled CQT spectrograms per shingle.
#[derive(Debug, Clone)]
pub struct Preprocessor<B: Backend> {
    sample_rate: u32,
    default_len: f32,
    default_hop: f32,
    min_samples: usize,
    cqt: CqtTransform<B>,
    pool: AvgPool1d,
}

impl<B: Backend> Preprocessor<B> {
    pub fn new(config: &ModelConfig, device: &B::Device) -> Result<Self> {
        let kernels = CqtKernels::new(
            config.sample_rate,
            config.cqt.fmin,
            config.cqt_bins(),
            config.cqt.nbinsoct,
        )?;
        debug!(
            bins = kernels.bins(),
            width = kernels.width(),
            hop = config.cqt_hop_samples(),
            "Built CQT kernels"
        );
        let pool = AvgPool1dConfig::new(config.cqt.pool.len)
            .with_stride(config.cqt.pool.hop)
            .init();
        Ok(Self {
            sample_rate: config.sample_rate,
            default_len: config.shingling.len,
            default_hop: config.shingling.hop,
            min_samples: config.min_shingle_samples(),
            cqt: CqtTransform::new(&kernels, config.cqt_hop_samples(), device),
            pool,
        })
    }

    /// `[batch, time]` audio to `[batch, shingles, bins, frames]` spectrograms.
    ///
    /// Shingles shorter than the configured length are zero-padded up to it.
    pub fn prepare(&self, wave: Tensor<B, 2>, shingle: ShingleParams) -> Result<Tensor<B, 4>> {
        let len = resolve_seconds("length", shingle.len, self.default_len)?;
        let hop = resolve_seconds("hop", shingle.hop, self.default_hop)?;
        let win = seconds_to_samples(len, self.sample_rate);
        let hop = seconds_to_samples(hop, self.sample_rate);

        let frames = get_frames(wave, win, hop)?;
        let frames = force_length(frames, self.min_samples, true);
        let [batch, shingles, samples] = frames.dims();

        let spec = self.cqt.forward(frames.reshape([batch * shingles, samples]))?;
        let spec = self.pool.forward(spec);
        let [_, bins, steps] = spec.dims();
        debug!(batch, shingles, samples, bins, steps, "Prepared shingle spectrograms");
        Ok(spec.reshape([batch, shingles, bins, steps]))
    }
}

fn resolve_seconds(what: &str, value: Option<f32>, default: f32) -> Result<f32> {
    match value {
        None => Ok(default),
        Some(seconds) if seconds > 0.0 => Ok(seconds),
        Some(seconds) => Err(EmbedError::Config(format!(
            "shingle {what} must be positive, got {seconds}"
        ))),
    }
}
