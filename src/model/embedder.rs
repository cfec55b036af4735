use burn::prelude::*;
use tracing::debug;

use super::net::{EmbeddingNet, EmbeddingNetConfig};
use crate::config::ModelConfig;
use crate::distance::Redux;
use crate::error::Result;
use crate::loss::{LossOutput, LossParams, triplet_loss};
use crate::scoring;
use crate::signal::{Preprocessor, ShingleParams};

/// Front-end plus network: waveforms in, per-shingle embeddings out.
///
/// The network is the only trainable part; a training harness updates it
/// through [`ShingleEmbedder::net`] and [`ShingleEmbedder::set_net`].
#[derive(Debug, Clone)]
pub struct ShingleEmbedder<B: Backend> {
    config: ModelConfig,
    preprocessor: Preprocessor<B>,
    net: EmbeddingNet<B>,
}

impl<B: Backend> ShingleEmbedder<B> {
    /// Validate `config` and build a freshly initialized model.
    pub fn new(config: ModelConfig, device: &B::Device) -> Result<Self> {
        config.validate()?;
        let net = Self::net_config(&config).init(device);
        Self::assemble(config, net, device)
    }

    /// Wrap an existing network (for example one loaded from a checkpoint).
    pub fn with_net(config: ModelConfig, net: EmbeddingNet<B>, device: &B::Device) -> Result<Self> {
        config.validate()?;
        Self::assemble(config, net, device)
    }

    /// Same as [`ShingleEmbedder::with_net`] for a config that already passed validation.
    pub(crate) fn assemble(
        config: ModelConfig,
        net: EmbeddingNet<B>,
        device: &B::Device,
    ) -> Result<Self> {
        let preprocessor = Preprocessor::new(&config, device)?;
        debug!(
            bins = config.cqt_bins(),
            ncha_in = config.ncha_in,
            zdim = config.zdim,
            "Built shingle embedder"
        );
        Ok(Self {
            config,
            preprocessor,
            net,
        })
    }

    pub fn net_config(config: &ModelConfig) -> EmbeddingNetConfig {
        EmbeddingNetConfig::new(config.ncha_in, config.zdim, config.eps)
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn net(&self) -> &EmbeddingNet<B> {
        &self.net
    }

    pub fn set_net(&mut self, net: EmbeddingNet<B>) {
        self.net = net;
    }

    pub fn into_net(self) -> EmbeddingNet<B> {
        self.net
    }

    /// Configured shingle length and hop, in seconds.
    pub fn shingle_params(&self) -> (f32, f32) {
        self.config.shingle_params()
    }

    /// `[batch, time]` audio to `[batch, shingles, zdim]` embeddings.
    ///
    /// The spectrogram front-end is detached from the autodiff graph.
    pub fn forward(&self, wave: Tensor<B, 2>, shingle: ShingleParams) -> Result<Tensor<B, 3>> {
        let spec = self.prepare(wave, shingle)?.detach();
        Ok(self.embed(spec))
    }

    pub fn prepare(&self, wave: Tensor<B, 2>, shingle: ShingleParams) -> Result<Tensor<B, 4>> {
        self.preprocessor.prepare(wave, shingle)
    }

    pub fn embed(&self, spec: Tensor<B, 4>) -> Tensor<B, 3> {
        self.net.embed(spec)
    }

    /// Training loss for one label per batch item.
    pub fn loss(&self, labels: Tensor<B, 1, Int>, z: Tensor<B, 3>) -> Result<LossOutput<B>> {
        let params = LossParams {
            margin: self.config.margin,
            lamb: self.config.lamb,
            eps: self.config.eps,
        };
        triplet_loss(labels, z, params)
    }

    /// Query x candidate distance matrix; see [`scoring::distances`].
    pub fn distances(
        &self,
        q: Tensor<B, 3>,
        c: Tensor<B, 3>,
        qmask: Option<Tensor<B, 2, Bool>>,
        cmask: Option<Tensor<B, 2, Bool>>,
        redux: Option<Redux>,
    ) -> Result<Tensor<B, 2>> {
        scoring::distances(q, c, qmask, cmask, redux)
    }
}
