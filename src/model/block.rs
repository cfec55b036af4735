use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, PaddingConfig2d};
use burn::prelude::*;

/// Shape of one convolution in the stack (height, width order).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ConvSpec {
    pub kernel: [usize; 2],
    pub padding: [usize; 2],
    pub dilation: [usize; 2],
}

impl ConvSpec {
    const fn new(kh: usize, kw: usize) -> Self {
        Self {
            kernel: [kh, kw],
            padding: [0, 0],
            dilation: [1, 1],
        }
    }

    const fn padded(mut self, ph: usize, pw: usize) -> Self {
        self.padding = [ph, pw];
        self
    }

    const fn dilated(mut self, dh: usize, dw: usize) -> Self {
        self.dilation = [dh, dw];
        self
    }

    fn output(&self, extent: [usize; 2]) -> Option<[usize; 2]> {
        let mut out = [0usize; 2];
        for axis in 0..2 {
            let padded = extent[axis] + 2 * self.padding[axis];
            let reach = self.dilation[axis] * (self.kernel[axis] - 1) + 1;
            if padded < reach {
                return None;
            }
            out[axis] = padded - reach + 1;
        }
        Some(out)
    }

    fn init<B: Backend>(&self, channels: [usize; 2], device: &B::Device) -> Conv2d<B> {
        Conv2dConfig::new(channels, self.kernel)
            .with_padding(PaddingConfig2d::Explicit(self.padding[0], self.padding[1]))
            .with_dilation(self.dilation)
            .with_bias(false)
            .init(device)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockPool {
    /// Max pool halving the time axis.
    HalveTime,
    /// Max over the whole remaining map.
    Global,
}

/// One conv-bn-relu-conv-bn-relu-pool stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BlockSpec {
    pub channels: [usize; 3],
    pub first: ConvSpec,
    pub second: ConvSpec,
    pub pool: BlockPool,
}

/// The five stages, with `base` input channels for the first convolution.
pub(crate) fn block_specs(base: usize) -> [BlockSpec; 5] {
    let c = base;
    let dilated3 = ConvSpec::new(3, 3).dilated(1, 2);
    [
        BlockSpec {
            channels: [1, c, 2 * c],
            first: ConvSpec::new(12, 3).padded(6, 0),
            second: ConvSpec::new(13, 3).dilated(1, 2),
            pool: BlockPool::HalveTime,
        },
        BlockSpec {
            channels: [2 * c, 2 * c, 2 * c],
            first: ConvSpec::new(13, 3),
            second: dilated3,
            pool: BlockPool::HalveTime,
        },
        BlockSpec {
            channels: [2 * c, 4 * c, 4 * c],
            first: ConvSpec::new(3, 3),
            second: dilated3,
            pool: BlockPool::HalveTime,
        },
        BlockSpec {
            channels: [4 * c, 8 * c, 8 * c],
            first: ConvSpec::new(3, 3),
            second: dilated3,
            pool: BlockPool::HalveTime,
        },
        BlockSpec {
            channels: [8 * c, 16 * c, 16 * c],
            first: ConvSpec::new(3, 3),
            second: dilated3,
            pool: BlockPool::Global,
        },
    ]
}

/// Spatial extent left before the global pool for a `height x width` input,
/// or `None` when some layer would see an empty map.
pub fn output_extent(height: usize, width: usize) -> Option<[usize; 2]> {
    let mut extent = [height, width];
    for spec in block_specs(1) {
        extent = spec.first.output(extent)?;
        extent = spec.second.output(extent)?;
        if spec.pool == BlockPool::HalveTime {
            if extent[1] < 2 {
                return None;
            }
            extent[1] /= 2;
        }
    }
    Some(extent)
}

#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub(crate) conv1: Conv2d<B>,
    norm1: BatchNorm<B>,
    pub(crate) conv2: Conv2d<B>,
    norm2: BatchNorm<B>,
    /// `None` for the final block, which max-pools globally.
    pool: Option<MaxPool2d>,
}

impl<B: Backend> ConvBlock<B> {
    pub(crate) fn new(spec: &BlockSpec, device: &B::Device) -> Self {
        let [input, mid, output] = spec.channels;
        let pool = match spec.pool {
            BlockPool::HalveTime => Some(MaxPool2dConfig::new([1, 2]).with_strides([1, 2]).init()),
            BlockPool::Global => None,
        };
        Self {
            conv1: spec.first.init([input, mid], device),
            norm1: BatchNormConfig::new(mid).init(device),
            conv2: spec.second.init([mid, output], device),
            norm2: BatchNormConfig::new(output).init(device),
            pool,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = burn::tensor::activation::relu(self.norm1.forward(self.conv1.forward(x)));
        let x = burn::tensor::activation::relu(self.norm2.forward(self.conv2.forward(x)));
        match &self.pool {
            Some(pool) => pool.forward(x),
            None => x.max_dim(3).max_dim(2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extent_tracks_each_block() {
        assert_eq!(output_extent(84, 250), Some([47, 4]));
        assert_eq!(output_extent(48, 241), Some([11, 3]));
    }

    #[test]
    fn extent_rejects_collapsing_inputs() {
        assert_eq!(output_extent(37, 500), None);
        assert_eq!(output_extent(84, 201), None);
        assert!(output_extent(84, 202).is_some());
    }

    #[test]
    fn specs_scale_channels_from_base() {
        let specs = block_specs(4);
        assert_eq!(specs[0].channels, [1, 4, 8]);
        assert_eq!(specs[4].channels, [32, 64, 64]);
        assert_eq!(specs[4].pool, BlockPool::Global);
    }
}
