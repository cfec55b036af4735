use burn::module::Ignored;
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;

use super::block::{ConvBlock, block_specs};

#[derive(Config, Debug)]
pub struct EmbeddingNetConfig {
    /// Channels of the first convolution; the stack widens to 16x this.
    pub ncha_in: usize,
    /// Embedding dimension.
    pub zdim: usize,
    /// Guard added to the per-shingle peak before normalizing.
    pub eps: f32,
    /// Whether the final projection carries a bias.
    #[config(default = true)]
    pub head_bias: bool,
}

impl EmbeddingNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> EmbeddingNet<B> {
        let blocks = block_specs(self.ncha_in)
            .iter()
            .map(|spec| ConvBlock::new(spec, device))
            .collect();
        EmbeddingNet {
            blocks,
            fc: LinearConfig::new(16 * self.ncha_in, self.zdim)
                .with_bias(self.head_bias)
                .init(device),
            eps: Ignored(self.eps),
        }
    }
}

/// Convolutional stack mapping per-shingle spectrograms to unit-norm embeddings.
#[derive(Module, Debug)]
pub struct EmbeddingNet<B: Backend> {
    pub(crate) blocks: Vec<ConvBlock<B>>,
    pub(crate) fc: Linear<B>,
    eps: Ignored<f32>,
}

impl<B: Backend> EmbeddingNet<B> {
    /// `[batch, shingles, bins, frames]` spectrograms to `[batch, shingles, zdim]`.
    pub fn embed(&self, spec: Tensor<B, 4>) -> Tensor<B, 3> {
        let [batch, shingles, bins, frames] = spec.dims();
        let x = spec.reshape([batch * shingles, bins, frames]);
        let peak = x.clone().abs().max_dim(1).max_dim(2);
        let x = x / peak.add_scalar(self.eps.0);

        let mut x = x.unsqueeze_dim::<4>(1);
        for block in &self.blocks {
            x = block.forward(x);
        }
        let [rows, channels, _, _] = x.dims();
        let z = self.fc.forward(x.reshape([rows, channels]));
        let [_, zdim] = z.dims();
        l2_normalize(z).reshape([batch, shingles, zdim])
    }
}

/// Row-wise L2 normalization with the norm floored away from zero.
pub(crate) fn l2_normalize<B: Backend>(x: Tensor<B, 2>) -> Tensor<B, 2> {
    let norm = x.clone().powf_scalar(2.0).sum_dim(1).sqrt().clamp_min(1e-12);
    x / norm
}
