//! Background color policy and ground-truth compositing.

use glam::Vec3;
use rand::Rng;
use std::str::FromStr;

use crate::error::TrainError;
use crate::sampling::Stage;

/// How the background behind the foreground mask is colored during training.
///
/// Evaluation always uses white.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundPolicy {
    White,
    Black,
    /// A fresh uniform RGB color every training step.
    Random,
}

impl FromStr for BackgroundPolicy {
    type Err = TrainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "white" => Ok(Self::White),
            "black" => Ok(Self::Black),
            "random" => Ok(Self::Random),
            other => Err(TrainError::Unsupported {
                what: "background policy",
                value: other.to_string(),
            }),
        }
    }
}

impl BackgroundPolicy {
    /// Background color for one step of `stage`.
    pub fn color<R: Rng + ?Sized>(&self, stage: Stage, rng: &mut R) -> Vec3 {
        if stage != Stage::Train {
            return Vec3::ONE;
        }
        match self {
            Self::White => Vec3::ONE,
            Self::Black => Vec3::ZERO,
            Self::Random => Vec3::new(rng.r#gen(), rng.r#gen(), rng.r#gen()),
        }
    }
}

/// `rgb = rgb * mask + background * (1 - mask)`, per pixel.
pub fn composite(rgb: &mut [Vec3], mask: &[f32], background: Vec3) {
    for (c, &m) in rgb.iter_mut().zip(mask) {
        *c = *c * m + background * (1.0 - m);
    }
}
