use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor, TensorData};

use crate::error::{EmbedError, Result};

/// Split `[batch, time]` audio into overlapping `[batch, shingles, win]` frames.
///
/// The tail is zero-padded so the last frame is complete; audio shorter than
/// one window becomes a single zero-padded frame.
pub fn get_frames<B: Backend>(wave: Tensor<B, 2>, win: usize, hop: usize) -> Result<Tensor<B, 3>> {
    if win == 0 || hop == 0 {
        return Err(EmbedError::Shape(format!(
            "frame window and hop must be positive (win={win}, hop={hop})"
        )));
    }
    let [batch, len] = wave.dims();
    let count = 1 + len.saturating_sub(win).div_ceil(hop);
    let padded_len = (count - 1) * hop + win;
    let wave = force_length(wave, padded_len, true);

    let mut indices = Vec::with_capacity(count * win);
    for shingle in 0..count {
        let start = shingle * hop;
        indices.extend((start..start + win).map(|idx| idx as i64));
    }
    let device = wave.device();
    let indices = Tensor::<B, 1, Int>::from_data(TensorData::new(indices, [count * win]), &device);
    Ok(wave.select(1, indices).reshape([batch, count, win]))
}

/// Zero-pad (or, unless `allow_longer`, truncate) the last axis to `len`.
pub fn force_length<B: Backend, const D: usize>(
    x: Tensor<B, D>,
    len: usize,
    allow_longer: bool,
) -> Tensor<B, D> {
    let mut dims = x.dims();
    let current = dims[D - 1];
    if current < len {
        dims[D - 1] = len - current;
        let zeros = Tensor::<B, D>::zeros(dims, &x.device());
        return Tensor::cat(vec![x, zeros], D - 1);
    }
    if current > len && !allow_longer {
        return x.narrow(D - 1, 0, len);
    }
    x
}
