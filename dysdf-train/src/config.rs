//! Run configuration, deserialized from YAML.
//!
//! Layout follows the experiment files the system is driven by:
//! `model.sampling`, `model.background`, `model.alpha_ratio`,
//! `model.isosurface`, `system.loss`, plus output and logger sections.
//! Policy strings (`background`, `alpha_ratio.strategy`) are kept as text here
//! and validated when a system is built.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_train_num_rays() -> usize {
    1024
}

fn default_true() -> bool {
    true
}

fn default_background() -> String {
    "white".to_string()
}

fn default_strategy() -> String {
    "interpolated".to_string()
}

fn default_max_steps() -> u64 {
    50_000
}

fn default_resolution() -> u32 {
    128
}

fn default_save_dir() -> PathBuf {
    PathBuf::from("exp")
}

fn default_fps() -> u32 {
    30
}

/// Top-level run configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Seed for the ray sampler and random backgrounds; entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub system: LossSection,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logger: LoggerConfig,
}

impl SystemConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub sampling: SamplingConfig,
    /// `white`, `black` or `random`.
    #[serde(default = "default_background")]
    pub background: String,
    #[serde(default)]
    pub alpha_ratio: Option<AlphaRatioConfig>,
    #[serde(default)]
    pub isosurface: IsosurfaceConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            sampling: SamplingConfig::default(),
            background: default_background(),
            alpha_ratio: None,
            isosurface: IsosurfaceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Rays per training step.
    #[serde(default = "default_train_num_rays")]
    pub train_num_rays: usize,
    /// Draw a fresh image for every training ray instead of one per batch.
    #[serde(default = "default_true")]
    pub batch_image_sampling: bool,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            train_num_rays: default_train_num_rays(),
            batch_image_sampling: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlphaRatioConfig {
    #[serde(default = "default_strategy")]
    pub strategy: String,
    #[serde(default = "default_max_steps")]
    pub max_steps: u64,
}

impl Default for AlphaRatioConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            max_steps: default_max_steps(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsosurfaceConfig {
    /// Grid cells per axis for mesh extraction.
    #[serde(default = "default_resolution")]
    pub resolution: u32,
}

impl Default for IsosurfaceConfig {
    fn default() -> Self {
        Self {
            resolution: default_resolution(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LossSection {
    #[serde(default)]
    pub loss: LossWeights,
}

/// Per-term loss weights; a term is enabled when its weight is positive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LossWeights {
    #[serde(default)]
    pub rgb: f32,
    #[serde(default)]
    pub mask: f32,
    #[serde(default)]
    pub eikonal: f32,
}

impl LossWeights {
    pub fn new(rgb: f32, mask: f32, eikonal: f32) -> Self {
        Self { rgb, mask, eikonal }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root directory for meshes, renderings and result files.
    #[serde(default = "default_save_dir")]
    pub save_dir: PathBuf,
    /// Frame rate of exported render sequences.
    #[serde(default = "default_fps")]
    pub sequence_fps: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            save_dir: default_save_dir(),
            sequence_fps: default_fps(),
        }
    }
}

/// Which metric sink to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoggerKind {
    #[default]
    Console,
    ImageDir,
    None,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggerConfig {
    #[serde(default)]
    pub kind: LoggerKind,
    /// Output directory, required by `image_dir`.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}
