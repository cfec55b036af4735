//! The shingle embedding network and the pipeline wrapping it.

mod block;
mod embedder;
mod net;

pub use block::{ConvBlock, output_extent};
pub use embedder::ShingleEmbedder;
pub use net::{EmbeddingNet, EmbeddingNetConfig};

pub(crate) use net::l2_normalize;
