//! Retrieval scoring between query and candidate embedding sets.

use burn::prelude::*;

use crate::distance::{
    DistanceMode, Redux, distance_tensor_redux, pairwise_distance_matrix, to_pair_grid,
};
use crate::error::{EmbedError, Result};

/// `[bq, sq, c]` queries x `[bc, sc, c]` candidates to a `[bq, bc]` distance matrix.
///
/// Shingle distances are cosine distances. Masks flag padding shingles with
/// `true`; a shingle pair is skipped when either side is padding, and a
/// missing mask treats every shingle on that side as real. `redux` defaults
/// to [`Redux::Min`], the best-matching shingle pair.
pub fn distances<B: Backend>(
    q: Tensor<B, 3>,
    c: Tensor<B, 3>,
    qmask: Option<Tensor<B, 2, Bool>>,
    cmask: Option<Tensor<B, 2, Bool>>,
    redux: Option<Redux>,
) -> Result<Tensor<B, 2>> {
    let [bq, sq, dq] = q.dims();
    let [bc, sc, dc] = c.dims();
    if dq != dc {
        return Err(EmbedError::Shape(format!(
            "query dim {dq} does not match candidate dim {dc}"
        )));
    }
    let device = q.device();
    let dist = pairwise_distance_matrix(
        q.reshape([bq * sq, dq]),
        c.reshape([bc * sc, dc]),
        DistanceMode::Cosine,
    )?;
    let dist = to_pair_grid(dist, sq, sc)?;

    let mask = if qmask.is_none() && cmask.is_none() {
        None
    } else {
        let qmask = shingle_mask(qmask, [bq, sq], &device)?;
        let cmask = shingle_mask(cmask, [bc, sc], &device)?;
        let rows = bq * sq;
        let cols = bc * sc;
        let either = qmask.reshape([rows, 1]).expand([rows, cols])
            + cmask.reshape([1, cols]).expand([rows, cols]);
        Some(to_pair_grid(either, sq, sc)?.greater_elem(0.5))
    };
    distance_tensor_redux(dist, redux.unwrap_or_default(), mask)
}

/// A validated mask as 0/1 floats, or all zeros when absent.
fn shingle_mask<B: Backend>(
    mask: Option<Tensor<B, 2, Bool>>,
    shape: [usize; 2],
    device: &B::Device,
) -> Result<Tensor<B, 2>> {
    match mask {
        None => Ok(Tensor::zeros(shape, device)),
        Some(mask) if mask.dims() == shape => Ok(mask.float()),
        Some(mask) => Err(EmbedError::Shape(format!(
            "mask shape {:?} does not match embeddings {:?}",
            mask.dims(),
            shape
        ))),
    }
}

/// Candidates per query, nearest first.
pub fn rank_candidates<B: Backend>(dist: Tensor<B, 2>) -> Result<Vec<Vec<(usize, f32)>>> {
    let [rows, cols] = dist.dims();
    let values = dist
        .into_data()
        .to_vec::<f32>()
        .map_err(|err| EmbedError::Shape(format!("failed to read distances: {err:?}")))?;
    let mut ranked = Vec::with_capacity(rows);
    for row in values.chunks(cols.max(1)).take(rows) {
        let mut order: Vec<(usize, f32)> = row.iter().copied().enumerate().collect();
        order.sort_by(|a, b| a.1.total_cmp(&b.1));
        ranked.push(order);
    }
    Ok(ranked)
}

/// Items with differing shingle counts packed into one zero-padded batch.
#[derive(Debug, Clone, PartialEq)]
pub struct PaddedBatch {
    pub values: Vec<f32>,
    /// `true` for padding shingles.
    pub mask: Vec<bool>,
    pub items: usize,
    pub shingles: usize,
    pub dim: usize,
}

impl PaddedBatch {
    /// Pack `items[i][s]` embedding vectors of length `dim`.
    pub fn pack(items: &[Vec<Vec<f32>>], dim: usize) -> Result<Self> {
        if items.is_empty() || dim == 0 {
            return Err(EmbedError::Shape("cannot pack an empty batch".into()));
        }
        let shingles = items.iter().map(Vec::len).max().unwrap_or(0);
        if shingles == 0 {
            return Err(EmbedError::Shape("every item has zero shingles".into()));
        }
        let mut values = vec![0.0_f32; items.len() * shingles * dim];
        let mut mask = vec![true; items.len() * shingles];
        for (item_idx, item) in items.iter().enumerate() {
            for (shingle_idx, vector) in item.iter().enumerate() {
                if vector.len() != dim {
                    return Err(EmbedError::Shape(format!(
                        "item {item_idx} shingle {shingle_idx} has dim {}, expected {dim}",
                        vector.len()
                    )));
                }
                let slot = item_idx * shingles + shingle_idx;
                values[slot * dim..(slot + 1) * dim].copy_from_slice(vector);
                mask[slot] = false;
            }
        }
        Ok(Self {
            values,
            mask,
            items: items.len(),
            shingles,
            dim,
        })
    }

    /// `[items, shingles, dim]` embeddings and their `[items, shingles]` padding mask.
    pub fn to_tensors<B: Backend>(&self, device: &B::Device) -> (Tensor<B, 3>, Tensor<B, 2, Bool>) {
        let embeddings = Tensor::from_data(
            TensorData::new(self.values.clone(), [self.items, self.shingles, self.dim]),
            device,
        );
        let mask = Tensor::from_data(
            TensorData::new(self.mask.clone(), [self.items, self.shingles]),
            device,
        );
        (embeddings, mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn set(values: Vec<f32>, shape: [usize; 3]) -> Tensor<TestBackend, 3> {
        Tensor::from_data(TensorData::new(values, shape), &Default::default())
    }

    fn bools(values: Vec<bool>, shape: [usize; 2]) -> Tensor<TestBackend, 2, Bool> {
        Tensor::from_data(TensorData::new(values, shape), &Default::default())
    }

    fn read(tensor: Tensor<TestBackend, 2>) -> Vec<f32> {
        tensor.into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn min_redux_picks_best_shingle_pair() {
        // Query shingles at +x and +y; candidate 0 at -x/+y, candidate 1 at -x/-y.
        let q = set(vec![1.0, 0.0, 0.0, 1.0], [1, 2, 2]);
        let c = set(vec![-1.0, 0.0, 0.0, 1.0, -1.0, 0.0, 0.0, -1.0], [2, 2, 2]);
        let dist = read(distances(q, c, None, None, None).unwrap());
        assert!(dist[0].abs() < 1e-5);
        assert!((dist[1] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn mean_redux_averages_all_pairs() {
        let q = set(vec![1.0, 0.0], [1, 1, 2]);
        let c = set(vec![1.0, 0.0, -1.0, 0.0], [1, 2, 2]);
        let dist = read(distances(q, c, None, None, Some(Redux::Mean)).unwrap());
        assert!((dist[0] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn padded_shingles_are_ignored() {
        let q = set(vec![1.0, 0.0, 0.0, 1.0], [1, 2, 2]);
        let c = set(vec![0.0, 1.0, 1.0, 0.0], [1, 2, 2]);
        // Drop query shingle 1 (+y) and candidate shingle 1 (+x): only +x vs +y remains.
        let qmask = bools(vec![false, true], [1, 2]);
        let cmask = bools(vec![false, true], [1, 2]);
        let dist = distances(q.clone(), c.clone(), Some(qmask.clone()), Some(cmask), None);
        let dist = read(dist.unwrap());
        assert!((dist[0] - 1.0).abs() < 1e-5);

        // Only the query mask: candidate shingle 1 still matches +x exactly.
        let dist = read(distances(q, c, Some(qmask), None, None).unwrap());
        assert!(dist[0].abs() < 1e-5);
    }

    #[test]
    fn mismatched_inputs_are_rejected() {
        let q = set(vec![1.0, 0.0], [1, 1, 2]);
        let c = set(vec![1.0, 0.0, 0.0], [1, 1, 3]);
        assert!(distances(q.clone(), c, None, None, None).is_err());
        let c = set(vec![1.0, 0.0], [1, 1, 2]);
        let bad = bools(vec![false, false], [1, 2]);
        assert!(distances(q, c, Some(bad), None, None).is_err());
    }

    #[test]
    fn ranking_sorts_ascending() {
        let dist = Tensor::<TestBackend, 2>::from_data(
            TensorData::new(vec![0.5, 0.1, 0.9, 0.3, 0.2, 0.1], [2, 3]),
            &Default::default(),
        );
        let ranked = rank_candidates(dist).unwrap();
        let order: Vec<Vec<usize>> = ranked
            .iter()
            .map(|row| row.iter().map(|(idx, _)| *idx).collect())
            .collect();
        assert_eq!(order, vec![vec![1, 0, 2], vec![2, 1, 0]]);
    }

    #[test]
    fn pack_pads_short_items() {
        let items = vec![
            vec![vec![1.0, 0.0]],
            vec![vec![0.0, 1.0], vec![0.6, 0.8]],
        ];
        let batch = PaddedBatch::pack(&items, 2).unwrap();
        assert_eq!(batch.shingles, 2);
        assert_eq!(batch.mask, vec![false, true, false, false]);
        assert_eq!(batch.values, vec![1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.6, 0.8]);
        let (embeddings, mask) = batch.to_tensors::<TestBackend>(&Default::default());
        assert_eq!(embeddings.dims(), [2, 2, 2]);
        assert_eq!(mask.dims(), [2, 2]);
    }

    #[test]
    fn pack_rejects_wrong_dims() {
        assert!(PaddedBatch::pack(&[], 2).is_err());
        assert!(PaddedBatch::pack(&[vec![vec![1.0]]], 2).is_err());
    }
}
