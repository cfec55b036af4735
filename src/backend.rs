//! Backend selection and device setup for inference tools.

use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;

use burn::backend::ndarray::{NdArray, NdArrayDevice};
#[cfg(target_os = "macos")]
use burn::backend::wgpu::{self, WgpuDevice, graphics::Metal};
#[cfg(not(target_os = "macos"))]
use burn::backend::wgpu::{self, WgpuDevice, graphics::Vulkan};
#[cfg(feature = "cuda")]
use burn::backend::{Cuda, cuda::CudaDevice};
use cubecl_runtime::config::GlobalConfig;
use cubecl_runtime::config::cache::CacheConfig;
use tracing::{debug, warn};

use crate::app_dirs;
use crate::error::{EmbedError, Result};

pub type WgpuBackend = wgpu::Wgpu;
pub type CpuBackend = NdArray;
#[cfg(feature = "cuda")]
pub type CudaBackend = Cuda;

pub type CpuDevice = NdArrayDevice;
pub type GpuDevice = WgpuDevice;
#[cfg(feature = "cuda")]
pub type CudaGpuDevice = CudaDevice;

/// File name of the default checkpoint inside the models directory.
pub const DEFAULT_CHECKPOINT_NAME: &str = "shinglenet.bpk";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Wgpu,
    Cpu,
    #[cfg(feature = "cuda")]
    Cuda,
}

impl BackendKind {
    /// Parse a backend name; unknown names fall back to WGPU with a warning.
    pub fn parse(value: Option<&str>) -> Self {
        let requested = value.map(|value| value.trim().to_ascii_lowercase());
        match requested.as_deref() {
            #[cfg(feature = "cuda")]
            Some("cuda") => BackendKind::Cuda,
            Some("cpu") | Some("ndarray") => BackendKind::Cpu,
            Some("wgpu") | Some("vulkan") | Some("metal") | Some("") | None => BackendKind::Wgpu,
            Some(other) => {
                warn!("Unknown backend '{other}', defaulting to WGPU.");
                BackendKind::Wgpu
            }
        }
    }

    /// Backend requested through `SHINGLENET_BACKEND`.
    pub fn from_env() -> Self {
        Self::parse(env::var("SHINGLENET_BACKEND").ok().as_deref())
    }
}

impl BackendKind {
    /// One-time runtime setup before the first tensor is placed on this backend.
    ///
    /// GPU backends share compiled kernels and autotune results across runs;
    /// WGPU is also bound to the platform graphics API here.
    pub fn prepare_runtime(self) {
        match self {
            BackendKind::Cpu => debug!("Using the ndarray CPU backend"),
            BackendKind::Wgpu => {
                install_kernel_cache();
                static WGPU_SETUP: OnceLock<()> = OnceLock::new();
                WGPU_SETUP.get_or_init(|| {
                    let device = GpuDevice::default();
                    #[cfg(target_os = "macos")]
                    wgpu::init_setup::<Metal>(&device, Default::default());
                    #[cfg(not(target_os = "macos"))]
                    wgpu::init_setup::<Vulkan>(&device, Default::default());
                    debug!(?device, "Initialized WGPU runtime");
                });
            }
            #[cfg(feature = "cuda")]
            BackendKind::Cuda => {
                install_kernel_cache();
                debug!("Using the CUDA backend");
            }
        }
    }
}

/// cubecl settings that keep compiled kernels and autotune results in the global cache.
pub fn kernel_cache_config() -> GlobalConfig {
    let mut config = GlobalConfig::default();
    config.compilation.cache = Some(CacheConfig::Global);
    config.autotune.cache = CacheConfig::Global;
    config
}

fn install_kernel_cache() {
    static INSTALLED: OnceLock<bool> = OnceLock::new();
    INSTALLED.get_or_init(|| {
        // cubecl panics when its config was already set by someone else.
        let installed = std::panic::catch_unwind(|| GlobalConfig::set(kernel_cache_config())).is_ok();
        if installed {
            debug!("Enabled the global cubecl kernel cache");
        } else {
            warn!("cubecl config was already set; kernel cache settings left unchanged");
        }
        installed
    });
}

/// Checkpoint path from `SHINGLENET_CHECKPOINT_PATH`, else the models directory.
pub fn checkpoint_path() -> Result<PathBuf> {
    if let Ok(path) = env::var("SHINGLENET_CHECKPOINT_PATH")
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }
    let dir = app_dirs::models_dir().map_err(|err| EmbedError::Checkpoint(err.to_string()))?;
    Ok(dir.join(DEFAULT_CHECKPOINT_NAME))
}
