//! Model configuration loaded from TOML.
//!
//! Every field has a default so a config file only needs to name what it
//! changes. [`ModelConfig::validate`] checks that the front-end and the
//! convolution stack agree on shapes before any weights are allocated.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EmbedError, Result};
use crate::model::output_extent;
use crate::signal::{CqtKernels, cqt_frame_count, pooled_frame_count, seconds_to_samples};

/// Top-level model configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Sample rate the model operates at, in Hz.
    pub sample_rate: u32,
    /// Small constant guarding divisions.
    pub eps: f32,
    pub shingling: ShinglingConfig,
    pub cqt: CqtConfig,
    /// Base channel count of the first convolution.
    pub ncha_in: usize,
    /// Embedding dimension.
    pub zdim: usize,
    /// Triplet hinge margin.
    pub margin: f32,
    /// Weight of the decorrelation regularizer.
    pub lamb: f32,
}

/// Shingle framing in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShinglingConfig {
    pub len: f32,
    pub hop: f32,
}

/// Constant-Q front-end settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CqtConfig {
    pub noctaves: usize,
    pub nbinsoct: usize,
    /// CQT hop in seconds.
    pub hoplen: f32,
    /// Centre frequency of the lowest bin, in Hz.
    pub fmin: f32,
    pub pool: PoolConfig,
}

/// Temporal average pooling applied after the CQT, in CQT frames.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub len: usize,
    pub hop: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            eps: 1e-6,
            shingling: ShinglingConfig::default(),
            cqt: CqtConfig::default(),
            ncha_in: 16,
            zdim: 512,
            margin: 0.3,
            lamb: 0.1,
        }
    }
}

impl Default for ShinglingConfig {
    fn default() -> Self {
        Self {
            len: 20.0,
            hop: 10.0,
        }
    }
}

impl Default for CqtConfig {
    fn default() -> Self {
        Self {
            noctaves: 7,
            nbinsoct: 12,
            hoplen: 0.02,
            fmin: 32.70,
            pool: PoolConfig::default(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { len: 4, hop: 4 }
    }
}

impl ModelConfig {
    /// Parse and validate a config from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|err| EmbedError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| EmbedError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| EmbedError::Toml {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        debug!(path = %path.display(), ?config, "Loaded model config");
        Ok(config)
    }

    /// Number of CQT bins (network input height).
    pub fn cqt_bins(&self) -> usize {
        self.cqt.noctaves * self.cqt.nbinsoct
    }

    /// Default shingle length and hop, in seconds.
    pub fn shingle_params(&self) -> (f32, f32) {
        (self.shingling.len, self.shingling.hop)
    }

    /// CQT hop in samples.
    pub fn cqt_hop_samples(&self) -> usize {
        seconds_to_samples(self.cqt.hoplen, self.sample_rate)
    }

    /// Minimum shingle length in samples; shorter shingles are zero-padded to it.
    pub fn min_shingle_samples(&self) -> usize {
        seconds_to_samples(self.shingling.len, self.sample_rate)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(EmbedError::Config("sample_rate must be positive".into()));
        }
        if !(self.eps > 0.0) {
            return Err(EmbedError::Config("eps must be positive".into()));
        }
        if self.ncha_in == 0 || self.zdim == 0 {
            return Err(EmbedError::Config("ncha_in and zdim must be positive".into()));
        }
        if !(self.shingling.len > 0.0) || !(self.shingling.hop > 0.0) {
            return Err(EmbedError::Config(
                "shingling len and hop must be positive".into(),
            ));
        }
        if self.cqt.noctaves == 0 || self.cqt.nbinsoct == 0 {
            return Err(EmbedError::Config("CQT needs at least one bin".into()));
        }
        if !(self.cqt.hoplen > 0.0) || self.cqt_hop_samples() == 0 {
            return Err(EmbedError::Config(format!(
                "CQT hop of {}s is shorter than one sample",
                self.cqt.hoplen
            )));
        }
        if self.cqt.pool.len == 0 || self.cqt.pool.hop == 0 {
            return Err(EmbedError::Config("CQT pool len and hop must be positive".into()));
        }
        if !(self.margin >= 0.0) || !(self.lamb >= 0.0) {
            return Err(EmbedError::Config("margin and lamb must be non-negative".into()));
        }

        let width = CqtKernels::checked_width(
            self.sample_rate,
            self.cqt.fmin,
            self.cqt_bins(),
            self.cqt.nbinsoct,
        )?;
        let min_samples = self.min_shingle_samples();
        if width / 2 >= min_samples {
            return Err(EmbedError::Config(format!(
                "shingle of {min_samples} samples is too short for a CQT kernel of width {width}"
            )));
        }

        let frames = pooled_frame_count(
            cqt_frame_count(min_samples, self.cqt_hop_samples()),
            self.cqt.pool.len,
            self.cqt.pool.hop,
        );
        if output_extent(self.cqt_bins(), frames).is_none() {
            return Err(EmbedError::Config(format!(
                "a {}x{frames} spectrogram collapses inside the convolution stack; \
                 raise the CQT bin count or the shingle length",
                self.cqt_bins()
            )));
        }
        Ok(())
    }
}

/// A configuration small enough to run the full network on the CPU in tests.
#[cfg(test)]
pub(crate) fn small_test_config() -> ModelConfig {
    ModelConfig {
        sample_rate: 4_000,
        eps: 1e-6,
        shingling: ShinglingConfig { len: 1.2, hop: 0.6 },
        cqt: CqtConfig {
            noctaves: 4,
            nbinsoct: 12,
            hoplen: 0.005,
            fmin: 100.0,
            pool: PoolConfig { len: 1, hop: 1 },
        },
        ncha_in: 2,
        zdim: 8,
        margin: 0.3,
        lamb: 0.1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn small_test_config_is_valid() {
        small_test_config().validate().unwrap();
    }

    #[test]
    fn defaults_validate() {
        let config = ModelConfig::default();
        config.validate().unwrap();
        assert_eq!(config.cqt_bins(), 84);
        assert_eq!(config.shingle_params(), (20.0, 10.0));
        assert_eq!(config.cqt_hop_samples(), 320);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ModelConfig::from_toml_str(
            r#"
            zdim = 128
            [cqt.pool]
            len = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.zdim, 128);
        assert_eq!(config.cqt.pool.len, 2);
        assert_eq!(config.cqt.pool.hop, 4);
        assert_eq!(config.sample_rate, 16_000);
    }

    #[test]
    fn top_bin_above_nyquist_is_rejected() {
        let config = ModelConfig {
            cqt: CqtConfig {
                noctaves: 9,
                ..CqtConfig::default()
            },
            ..ModelConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Nyquist"));
    }

    #[test]
    fn too_few_bins_are_rejected() {
        let config = ModelConfig {
            cqt: CqtConfig {
                noctaves: 2,
                ..CqtConfig::default()
            },
            ..ModelConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("collapses"));
    }

    #[test]
    fn short_shingles_are_rejected() {
        let config = ModelConfig {
            shingling: ShinglingConfig { len: 2.0, hop: 1.0 },
            ..ModelConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn very_low_fmin_is_rejected_without_building_kernels() {
        let config = ModelConfig {
            cqt: CqtConfig {
                fmin: 0.01,
                ..CqtConfig::default()
            },
            ..ModelConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, EmbedError::Config(_)));
        assert!(err.to_string().contains("too short for a CQT kernel"));
    }

    #[test]
    fn load_reports_parse_errors_with_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.toml");
        std::fs::write(&path, "zdim = \"wide\"").unwrap();
        let err = ModelConfig::load(&path).unwrap_err();
        assert!(matches!(err, EmbedError::Toml { .. }));
        assert!(err.to_string().contains("model.toml"));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.toml");
        std::fs::write(&path, "margin = 0.5\nlamb = 1.0\n").unwrap();
        let config = ModelConfig::load(&path).unwrap();
        assert_eq!(config.margin, 0.5);
        assert_eq!(config.lamb, 1.0);
    }
}
