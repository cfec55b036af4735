//! Waveform preparation: shingle framing, constant-Q transform, pooling.

mod cqt;
mod framing;
mod preprocessor;

pub use cqt::{CqtKernels, CqtTransform};
pub use framing::{force_length, get_frames};
pub use preprocessor::{Preprocessor, ShingleParams};

/// Convert a duration to a whole number of samples.
pub fn seconds_to_samples(seconds: f32, sample_rate: u32) -> usize {
    let samples = (seconds as f64 * sample_rate as f64).round();
    if samples.is_finite() && samples > 0.0 {
        samples as usize
    } else {
        0
    }
}

/// CQT frames produced for `samples` input samples with centred (reflection) padding.
pub fn cqt_frame_count(samples: usize, hop: usize) -> usize {
    samples / hop.max(1) + 1
}

/// Frames left after average pooling with the given window and stride.
pub fn pooled_frame_count(frames: usize, len: usize, hop: usize) -> usize {
    if len == 0 || frames < len {
        return 0;
    }
    (frames - len) / hop.max(1) + 1
}

#[cfg(test)]
mod tests;
