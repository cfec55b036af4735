//! Pairwise distances between embedding sets and their reduction over shingles.

use std::fmt;
use std::str::FromStr;

use burn::prelude::*;

use crate::error::{EmbedError, Result};
use crate::model::l2_normalize;

/// Squared distances are floored here before the square root so that
/// coincident points keep a finite gradient.
const EUCLIDEAN_FLOOR: f32 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceMode {
    /// L2 distance.
    Euclidean,
    /// One minus cosine similarity, in `[0, 2]`.
    Cosine,
    /// Raw dot product. A similarity: larger means closer.
    DotSim,
}

/// How a grid of shingle-pair distances collapses to one value per item pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Redux {
    Mean,
    #[default]
    Min,
    Max,
}

impl FromStr for Redux {
    type Err = EmbedError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mean" => Ok(Self::Mean),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            other => Err(EmbedError::Config(format!(
                "unknown reduction '{other}' (expected mean, min or max)"
            ))),
        }
    }
}

impl fmt::Display for Redux {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Mean => "mean",
            Self::Min => "min",
            Self::Max => "max",
        };
        f.write_str(name)
    }
}

/// `[n, c]` x `[m, c]` to an `[n, m]` matrix of distances (or similarities for `DotSim`).
pub fn pairwise_distance_matrix<B: Backend>(
    a: Tensor<B, 2>,
    b: Tensor<B, 2>,
    mode: DistanceMode,
) -> Result<Tensor<B, 2>> {
    let [n, dim_a] = a.dims();
    let [m, dim_b] = b.dims();
    if dim_a != dim_b {
        return Err(EmbedError::Shape(format!(
            "embedding dims differ: {dim_a} vs {dim_b}"
        )));
    }
    let dist = match mode {
        DistanceMode::Euclidean => {
            let a2 = a.clone().powf_scalar(2.0).sum_dim(1).expand([n, m]);
            let b2 = b.clone().powf_scalar(2.0).sum_dim(1).transpose().expand([n, m]);
            let ab = a.matmul(b.transpose());
            (a2 + b2 - ab.mul_scalar(2.0))
                .clamp_min(EUCLIDEAN_FLOOR)
                .sqrt()
        }
        DistanceMode::Cosine => l2_normalize(a)
            .matmul(l2_normalize(b).transpose())
            .neg()
            .add_scalar(1.0)
            .clamp(0.0, 2.0),
        DistanceMode::DotSim => a.matmul(b.transpose()),
    };
    Ok(dist)
}

/// Rearrange `[b1 * s1, b2 * s2]` into `[b1, b2, s1, s2]`.
pub fn to_pair_grid<B: Backend>(dist: Tensor<B, 2>, s1: usize, s2: usize) -> Result<Tensor<B, 4>> {
    let [rows, cols] = dist.dims();
    if s1 == 0 || s2 == 0 || rows % s1 != 0 || cols % s2 != 0 {
        return Err(EmbedError::Shape(format!(
            "cannot split a {rows}x{cols} matrix into {s1}x{s2} shingle blocks"
        )));
    }
    Ok(dist
        .reshape([rows / s1, s1, cols / s2, s2])
        .swap_dims(1, 2))
}

/// Reduce `[b1, b2, s1, s2]` over both shingle axes to `[b1, b2]`.
///
/// `mask` marks excluded shingle pairs with `true`. A pair with every entry
/// excluded reduces to `+inf` for `Mean`/`Min` and `-inf` for `Max`.
pub fn distance_tensor_redux<B: Backend>(
    dist: Tensor<B, 4>,
    redux: Redux,
    mask: Option<Tensor<B, 4, Bool>>,
) -> Result<Tensor<B, 2>> {
    let dims = dist.dims();
    let [b1, b2, _, _] = dims;
    let reduced = match mask {
        None => match redux {
            Redux::Mean => dist.mean_dim(3).mean_dim(2),
            Redux::Min => dist.min_dim(3).min_dim(2),
            Redux::Max => dist.max_dim(3).max_dim(2),
        },
        Some(mask) => {
            if mask.dims() != dims {
                return Err(EmbedError::Shape(format!(
                    "mask shape {:?} does not match distances {:?}",
                    mask.dims(),
                    dims
                )));
            }
            match redux {
                Redux::Mean => {
                    let keep = mask.bool_not().float();
                    let count = keep.clone().sum_dim(3).sum_dim(2);
                    let empty = count.clone().lower_elem(0.5);
                    let total = (dist * keep).sum_dim(3).sum_dim(2);
                    (total / count.clamp_min(1.0)).mask_fill(empty, f32::INFINITY)
                }
                Redux::Min => dist.mask_fill(mask, f32::INFINITY).min_dim(3).min_dim(2),
                Redux::Max => dist.mask_fill(mask, f32::NEG_INFINITY).max_dim(3).max_dim(2),
            }
        }
    };
    Ok(reduced.reshape([b1, b2]))
}
