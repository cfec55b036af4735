//! File-level embedding and query/candidate scoring.

use std::path::{Path, PathBuf};

use burn::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::audio_input::load_mono;
use crate::distance::Redux;
use crate::error::{EmbedError, Result};
use crate::model::ShingleEmbedder;
use crate::scoring::{PaddedBatch, distances, rank_candidates};
use crate::signal::ShingleParams;

/// Per-shingle embeddings of one audio file.
pub fn embed_file<B: Backend>(
    embedder: &ShingleEmbedder<B>,
    path: &Path,
    shingle: ShingleParams,
    device: &B::Device,
) -> Result<Vec<Vec<f32>>> {
    let samples = load_mono(path, embedder.config().sample_rate)?;
    let len = samples.len();
    let wave = Tensor::<B, 2>::from_data(TensorData::new(samples, [1, len]), device);
    let z = embedder.forward(wave, shingle)?;
    let [_, shingles, dim] = z.dims();
    let values = z
        .into_data()
        .to_vec::<f32>()
        .map_err(|err| EmbedError::Shape(format!("failed to read embeddings: {err:?}")))?;
    debug!(path = %path.display(), shingles, "Embedded file");
    Ok(values.chunks(dim).map(<[f32]>::to_vec).collect())
}

/// Distances and rankings for a set of query files against candidate files.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreReport {
    pub redux: String,
    pub queries: Vec<PathBuf>,
    pub candidates: Vec<PathBuf>,
    /// Row-major `[queries, candidates]` distances.
    pub distances: Vec<Vec<f32>>,
    pub rankings: Vec<Vec<RankedCandidate>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankedCandidate {
    pub index: usize,
    pub distance: f32,
}

pub fn score_files<B: Backend>(
    embedder: &ShingleEmbedder<B>,
    queries: &[PathBuf],
    candidates: &[PathBuf],
    shingle: ShingleParams,
    redux: Redux,
    device: &B::Device,
) -> Result<ScoreReport> {
    if queries.is_empty() || candidates.is_empty() {
        return Err(EmbedError::Config(
            "need at least one query and one candidate".into(),
        ));
    }
    let embed_all = |paths: &[PathBuf]| -> Result<Vec<Vec<Vec<f32>>>> {
        paths
            .iter()
            .map(|path| embed_file(embedder, path, shingle, device))
            .collect()
    };
    let dim = embedder.config().zdim;
    let query_batch = PaddedBatch::pack(&embed_all(queries)?, dim)?;
    let candidate_batch = PaddedBatch::pack(&embed_all(candidates)?, dim)?;
    let (q, qmask) = query_batch.to_tensors::<B>(device);
    let (c, cmask) = candidate_batch.to_tensors::<B>(device);
    let dist = distances(q, c, Some(qmask), Some(cmask), Some(redux))?;

    let rankings: Vec<Vec<RankedCandidate>> = rank_candidates(dist.clone())?
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|(index, distance)| RankedCandidate { index, distance })
                .collect()
        })
        .collect();
    let flat = dist
        .into_data()
        .to_vec::<f32>()
        .map_err(|err| EmbedError::Shape(format!("failed to read distances: {err:?}")))?;
    let matrix = flat.chunks(candidates.len()).map(<[f32]>::to_vec).collect();
    info!(
        queries = queries.len(),
        candidates = candidates.len(),
        %redux,
        "Scored files"
    );
    Ok(ScoreReport {
        redux: redux.to_string(),
        queries: queries.to_vec(),
        candidates: candidates.to_vec(),
        distances: matrix,
        rankings,
    })
}
