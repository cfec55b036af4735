//! Shingled constant-Q audio embeddings for version identification.
//!
//! Audio is cut into overlapping shingles, each turned into a CQT
//! spectrogram and embedded by a small CNN. Items are compared by reducing
//! the shingle-to-shingle distance grid to one score per pair.

/// Application directory layout (logs, checkpoints).
pub mod app_dirs;
/// Audio decoding for file-level scoring.
pub mod audio_input;
/// Backend selection and device setup.
pub mod backend;
/// Burnpack checkpoints.
pub mod checkpoint;
/// TOML model configuration and validation.
pub mod config;
/// Pairwise distances and shingle-grid reductions.
pub mod distance;
/// Crate error type.
pub mod error;
/// Global tracing setup.
pub mod logging;
/// Triplet loss with a decorrelation regularizer.
pub mod loss;
/// The embedding network and the embedder that wraps it.
pub mod model;
/// File-level embedding and scoring.
pub mod pipeline;
/// Query-candidate scoring over padded batches.
pub mod scoring;
/// Shingling and the CQT front-end.
pub mod signal;

pub use config::ModelConfig;
pub use distance::{DistanceMode, Redux};
pub use error::{EmbedError, Result};
pub use model::{EmbeddingNet, ShingleEmbedder};
pub use signal::ShingleParams;
