use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the embedding pipeline.
#[derive(Debug, Error)]
pub enum EmbedError {
    /// The model configuration is inconsistent or out of range.
    #[error("Invalid model config: {0}")]
    Config(String),
    /// A filesystem operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A TOML config file could not be parsed.
    #[error("Failed to parse config {path}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// Tensor shapes do not line up.
    #[error("Shape mismatch: {0}")]
    Shape(String),
    /// Loading or saving model weights failed.
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),
    /// Audio could not be decoded.
    #[error("Audio error: {0}")]
    Audio(String),
}

pub type Result<T> = std::result::Result<T, EmbedError>;
