//! Burnpack checkpoints for the embedding network.

use std::path::Path;

use burn::prelude::*;
use burn_store::{BurnpackStore, ModuleSnapshot};
use tracing::info;

use crate::config::ModelConfig;
use crate::error::{EmbedError, Result};
use crate::model::{EmbeddingNet, EmbeddingNetConfig, ShingleEmbedder};

/// Load network weights from `path` into a network shaped by `net_config`.
pub fn load_net<B: Backend>(
    net_config: &EmbeddingNetConfig,
    path: &Path,
    device: &B::Device,
) -> Result<EmbeddingNet<B>> {
    if !path.is_file() {
        return Err(EmbedError::Checkpoint(format!(
            "checkpoint not found at {}",
            path.display()
        )));
    }
    let mut net = net_config.init::<B>(device);
    let mut store = BurnpackStore::from_file(path);
    net.load_from(&mut store).map_err(|err| {
        EmbedError::Checkpoint(format!("failed to load {}: {err:?}", path.display()))
    })?;
    info!("Loaded checkpoint from {}", path.display());
    Ok(net)
}

/// Build a full embedder whose network comes from the checkpoint at `path`.
pub fn load_embedder<B: Backend>(
    config: ModelConfig,
    path: &Path,
    device: &B::Device,
) -> Result<ShingleEmbedder<B>> {
    config.validate()?;
    let net = load_net(&ShingleEmbedder::<B>::net_config(&config), path, device)?;
    ShingleEmbedder::assemble(config, net, device)
}

/// Write network weights to `path`, replacing any existing file.
pub fn save_net<B: Backend>(net: &EmbeddingNet<B>, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|source| EmbedError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    if path.exists() {
        std::fs::remove_file(path).map_err(|source| EmbedError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    }
    let mut store = BurnpackStore::from_file(path);
    net.save_into(&mut store).map_err(|err| {
        EmbedError::Checkpoint(format!("failed to save {}: {err:?}", path.display()))
    })?;
    info!("Saved checkpoint to {}", path.display());
    Ok(())
}
