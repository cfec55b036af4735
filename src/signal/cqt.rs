use std::f64::consts::PI;

use burn::tensor::backend::Backend;
use burn::tensor::module::conv1d;
use burn::tensor::ops::ConvOptions;
use burn::tensor::{Int, Tensor, TensorData};

use crate::error::{EmbedError, Result};

/// Time-domain constant-Q analysis kernels, kept on the host.
///
/// One complex kernel per bin, centred in a power-of-two wide buffer and
/// L1-normalized. Bin `k` sits at `fmin * 2^(k / bins_per_octave)`.
#[derive(Debug, Clone)]
pub struct CqtKernels {
    bins: usize,
    width: usize,
    real: Vec<f32>,
    imag: Vec<f32>,
    lengths: Vec<f32>,
    freqs: Vec<f32>,
}

impl CqtKernels {
    /// Check the kernel geometry and return the kernel width without building anything.
    pub fn checked_width(
        sample_rate: u32,
        fmin: f32,
        bins: usize,
        bins_per_octave: usize,
    ) -> Result<usize> {
        if sample_rate == 0 || bins == 0 || bins_per_octave == 0 {
            return Err(EmbedError::Config(
                "CQT needs a sample rate and at least one bin".into(),
            ));
        }
        if !(fmin > 0.0) {
            return Err(EmbedError::Config(format!("CQT fmin must be positive, got {fmin}")));
        }
        let sr = sample_rate as f64;
        let bpo = bins_per_octave as f64;
        let top = fmin as f64 * 2f64.powf((bins - 1) as f64 / bpo);
        if top > sr / 2.0 {
            return Err(EmbedError::Config(format!(
                "top CQT bin at {top:.1} Hz is above Nyquist ({:.1} Hz)",
                sr / 2.0
            )));
        }
        let longest = (quality_factor(bpo) * sr / fmin as f64).ceil();
        if !longest.is_finite() || longest > (1u64 << 40) as f64 {
            return Err(EmbedError::Config(format!(
                "CQT kernel for fmin {fmin} Hz is too long"
            )));
        }
        (longest as usize)
            .checked_next_power_of_two()
            .ok_or_else(|| EmbedError::Config(format!("CQT kernel for fmin {fmin} Hz is too long")))
    }

    pub fn new(sample_rate: u32, fmin: f32, bins: usize, bins_per_octave: usize) -> Result<Self> {
        let width = Self::checked_width(sample_rate, fmin, bins, bins_per_octave)?;
        let sr = sample_rate as f64;
        let bpo = bins_per_octave as f64;
        let q = quality_factor(bpo);
        let freqs: Vec<f64> = (0..bins)
            .map(|k| fmin as f64 * 2f64.powf(k as f64 / bpo))
            .collect();
        let lengths: Vec<f64> = freqs.iter().map(|f| (q * sr / f).ceil()).collect();

        let mut real = vec![0.0_f32; bins * width];
        let mut imag = vec![0.0_f32; bins * width];
        for (k, (&freq, &len)) in freqs.iter().zip(lengths.iter()).enumerate() {
            let l = len as usize;
            let centre = (width as f64 / 2.0 - len / 2.0).ceil() as usize;
            let start = if l % 2 == 1 { centre.saturating_sub(1) } else { centre };
            let offset = -(l.div_ceil(2) as f64);
            let omega = 2.0 * PI * freq / sr;

            let mut kernel = Vec::with_capacity(l);
            let mut l1 = 0.0_f64;
            for n in 0..l {
                let window = 0.5 - 0.5 * (2.0 * PI * n as f64 / len).cos();
                let phase = omega * (n as f64 + offset);
                let re = window * phase.cos() / len;
                let im = window * phase.sin() / len;
                l1 += (re * re + im * im).sqrt();
                kernel.push((re, im));
            }
            let l1 = if l1 > 0.0 { l1 } else { 1.0 };
            let row = k * width;
            for (n, (re, im)) in kernel.into_iter().enumerate() {
                let Some(col) = start.checked_add(n).filter(|col| *col < width) else {
                    continue;
                };
                real[row + col] = (re / l1) as f32;
                imag[row + col] = (im / l1) as f32;
            }
        }

        Ok(Self {
            bins,
            width,
            real,
            imag,
            lengths: lengths.into_iter().map(|l| l as f32).collect(),
            freqs: freqs.into_iter().map(|f| f as f32).collect(),
        })
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Kernel width in samples (a power of two).
    pub fn width(&self) -> usize {
        self.width
    }

    /// Effective window length of each bin, in samples.
    pub fn lengths(&self) -> &[f32] {
        &self.lengths
    }

    /// Centre frequency of each bin, in Hz.
    pub fn freqs(&self) -> &[f32] {
        &self.freqs
    }

    pub(crate) fn real(&self) -> &[f32] {
        &self.real
    }

    pub(crate) fn imag(&self) -> &[f32] {
        &self.imag
    }
}

fn quality_factor(bins_per_octave: f64) -> f64 {
    1.0 / (2f64.powf(1.0 / bins_per_octave) - 1.0)
}

/// Constant-Q magnitude spectrogram computed as a strided 1-D convolution.
#[derive(Debug, Clone)]
pub struct CqtTransform<B: Backend> {
    real: Tensor<B, 3>,
    imag: Tensor<B, 3>,
    scale: Tensor<B, 3>,
    hop: usize,
    pad: usize,
}

impl<B: Backend> CqtTransform<B> {
    pub fn new(kernels: &CqtKernels, hop: usize, device: &B::Device) -> Self {
        let shape = [kernels.bins(), 1, kernels.width()];
        let real = Tensor::from_data(TensorData::new(kernels.real().to_vec(), shape), device);
        let imag = Tensor::from_data(TensorData::new(kernels.imag().to_vec(), shape), device);
        let scale: Vec<f32> = kernels.lengths().iter().map(|l| l.sqrt()).collect();
        let scale = Tensor::from_data(TensorData::new(scale, [1, kernels.bins(), 1]), device);
        Self {
            real,
            imag,
            scale,
            hop: hop.max(1),
            pad: kernels.width() / 2,
        }
    }

    /// `[n, time]` audio to a `[n, bins, frames]` magnitude spectrogram.
    pub fn forward(&self, x: Tensor<B, 2>) -> Result<Tensor<B, 3>> {
        let x = reflect_pad(x, self.pad)?.unsqueeze_dim::<3>(1);
        let options = ConvOptions::new([self.hop], [0], [1], 1);
        let re = conv1d(x.clone(), self.real.clone(), None, options.clone()) * self.scale.clone();
        let im = conv1d(x, self.imag.clone(), None, options) * self.scale.clone();
        Ok((re.powf_scalar(2.0) + im.powf_scalar(2.0)).sqrt())
    }
}

/// Mirror `pad` samples at both ends of the last axis, excluding the edge sample.
fn reflect_pad<B: Backend>(x: Tensor<B, 2>, pad: usize) -> Result<Tensor<B, 2>> {
    if pad == 0 {
        return Ok(x);
    }
    let [_, len] = x.dims();
    if len <= pad {
        return Err(EmbedError::Shape(format!(
            "reflection padding of {pad} needs more than {pad} samples, got {len}"
        )));
    }
    let last = (len - 1) as i64;
    let indices: Vec<i64> = (0..len + 2 * pad)
        .map(|idx| {
            let src = idx as i64 - pad as i64;
            if src < 0 {
                -src
            } else if src > last {
                2 * last - src
            } else {
                src
            }
        })
        .collect();
    let count = indices.len();
    let indices = Tensor::<B, 1, Int>::from_data(TensorData::new(indices, [count]), &x.device());
    Ok(x.select(1, indices))
}
