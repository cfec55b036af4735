//! Batch-hard triplet loss over multi-shingle embeddings with a decorrelation
//! penalty on negative pairs.
//!
//! Item-level distances are the mean over all shingle pairs. For every anchor
//! the farthest positive and the closest negative in the batch form the
//! triplet. The regularizer pushes the mean dot similarity of negative pairs
//! towards zero, spreading embeddings over the sphere (Zhang et al., 2017,
//! "Learning Spread-out Local Feature Descriptors").

use burn::prelude::*;
use burn::tensor::activation::relu;

use crate::distance::{
    DistanceMode, Redux, distance_tensor_redux, pairwise_distance_matrix, to_pair_grid,
};
use crate::error::{EmbedError, Result};

/// Hyper-parameters of [`triplet_loss`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossParams {
    pub margin: f32,
    pub lamb: f32,
    pub eps: f32,
}

/// Loss terms; gradients flow through every tensor.
#[derive(Debug, Clone)]
pub struct LossOutput<B: Backend> {
    /// `triplet + lamb * decorrelation`.
    pub loss: Tensor<B, 1>,
    pub triplet: Tensor<B, 1>,
    pub decorrelation: Tensor<B, 1>,
    /// Mean hardest-positive distance.
    pub mean_dpos: Tensor<B, 1>,
    /// Mean hardest-negative distance.
    pub mean_dneg: Tensor<B, 1>,
}

/// Host-side snapshot of [`LossOutput`] for logging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossSummary {
    pub loss: f32,
    pub triplet: f32,
    pub decorrelation: f32,
    pub mean_dpos: f32,
    pub mean_dneg: f32,
}

impl<B: Backend> LossOutput<B> {
    pub fn summary(&self) -> LossSummary {
        let scalar = |t: &Tensor<B, 1>| t.clone().into_scalar().elem::<f32>();
        LossSummary {
            loss: scalar(&self.loss),
            triplet: scalar(&self.triplet),
            decorrelation: scalar(&self.decorrelation),
            mean_dpos: scalar(&self.mean_dpos),
            mean_dneg: scalar(&self.mean_dneg),
        }
    }
}

/// Loss for a batch of `[batch, shingles, dim]` unit-norm embeddings with one label each.
///
/// Anchors without any positive (or negative) in the batch fall back to the
/// distance bound `1.1 * sqrt(2 * dim)`, so they only contribute through the
/// side that exists.
pub fn triplet_loss<B: Backend>(
    labels: Tensor<B, 1, Int>,
    z: Tensor<B, 3>,
    params: LossParams,
) -> Result<LossOutput<B>> {
    let [batch, shingles, dim] = z.dims();
    let [count] = labels.dims();
    if count != batch {
        return Err(EmbedError::Shape(format!(
            "{count} labels for a batch of {batch} embeddings"
        )));
    }
    let device = z.device();
    let z = z.reshape([batch * shingles, dim]);

    let same = labels
        .clone()
        .reshape([batch, 1])
        .expand([batch, batch])
        .equal(labels.reshape([1, batch]).expand([batch, batch]))
        .float();
    let off_diagonal = identity::<B>(batch, &device).neg().add_scalar(1.0);
    let positive = same.clone() * off_diagonal.clone();
    let negative = same.neg().add_scalar(1.0) * off_diagonal;
    let dlimit = 1.1 * (2.0 * dim as f32).sqrt();

    let dist = pairwise_distance_matrix(z.clone(), z.clone(), DistanceMode::Euclidean)?;
    let dist = distance_tensor_redux(to_pair_grid(dist, shingles, shingles)?, Redux::Mean, None)?;
    let dpos = dist
        .clone()
        .mask_fill(positive.clone().lower_elem(0.5), -dlimit)
        .max_dim(1)
        .reshape([batch]);
    let dneg = dist
        .mask_fill(negative.clone().lower_elem(0.5), dlimit)
        .min_dim(1)
        .reshape([batch]);
    let triplet = relu((dpos.clone() - dneg.clone()).add_scalar(params.margin)).mean();

    let sim = pairwise_distance_matrix(z.clone(), z, DistanceMode::DotSim)?;
    let sim = distance_tensor_redux(to_pair_grid(sim, shingles, shingles)?, Redux::Mean, None)?;
    let decorrelation = (negative.clone() * sim.powf_scalar(2.0)).sum()
        / negative.sum().add_scalar(params.eps);

    Ok(LossOutput {
        loss: triplet.clone() + decorrelation.clone().mul_scalar(params.lamb),
        triplet,
        decorrelation,
        mean_dpos: dpos.mean(),
        mean_dneg: dneg.mean(),
    })
}

fn identity<B: Backend>(size: usize, device: &B::Device) -> Tensor<B, 2> {
    let mut values = vec![0.0_f32; size * size];
    for idx in 0..size {
        values[idx * size + idx] = 1.0;
    }
    Tensor::from_data(TensorData::new(values, [size, size]), device)
}
