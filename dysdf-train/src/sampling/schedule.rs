//! Alpha-ratio schedule: training progress fed to the renderer.

use std::str::FromStr;

use crate::config::AlphaRatioConfig;
use crate::error::{Result, TrainError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AlphaRatioStrategy {
    Interpolated,
}

impl FromStr for AlphaRatioStrategy {
    type Err = TrainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "interpolated" => Ok(Self::Interpolated),
            other => Err(TrainError::Unsupported {
                what: "alpha ratio strategy",
                value: other.to_string(),
            }),
        }
    }
}

/// Maps the global step to the renderer's alpha ratio in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlphaRatioSchedule {
    /// No schedule configured: always 1.
    Constant,
    /// `clamp(step / max_steps, 0, 1)`.
    Interpolated { max_steps: u64 },
}

impl AlphaRatioSchedule {
    pub fn from_config(config: Option<&AlphaRatioConfig>) -> Result<Self> {
        let Some(config) = config else {
            return Ok(Self::Constant);
        };
        match config.strategy.parse()? {
            AlphaRatioStrategy::Interpolated => Ok(Self::Interpolated {
                max_steps: config.max_steps,
            }),
        }
    }

    pub fn ratio(&self, step: u64) -> f32 {
        match *self {
            Self::Constant => 1.0,
            Self::Interpolated { max_steps: 0 } => 1.0,
            Self::Interpolated { max_steps } => {
                (step as f64 / max_steps as f64).clamp(0.0, 1.0) as f32
            }
        }
    }
}
