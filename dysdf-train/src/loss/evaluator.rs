//! Weighted multi-term loss for one render level.
//!
//! Terms, each active when its weight is positive:
//! - `loss_rgb`: L1 color error averaged over foreground rays only
//! - `loss_mask`: BCE between clamped opacity and the binarized mask
//! - `loss_eikonal`: the model's `gradient_error`, passed through
//!
//! Evaluation additionally reports `mpsnr`, `psnr`, `ssim` and `mask_bce`;
//! these never enter the loss.

use glam::Vec3;
use indexmap::IndexMap;
use tracing::warn;

use crate::config::LossWeights;
use crate::error::{Result, TrainError};
use crate::loss::criterions::{binary_cross_entropy, masked_mean, psnr, ssim};
use crate::model::LevelOutput;
use crate::sampling::RayBatch;

const OPACITY_EPS: f32 = 1e-3;

/// Named scalars in insertion order.
pub type Stats = IndexMap<String, f32>;

/// Whether evaluation metrics are computed, and on which frame shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalMode {
    Train,
    Eval { width: u32, height: u32 },
}

/// Gradient of a level's total loss with respect to the model outputs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LevelGradients {
    pub rgb: Vec<Vec3>,
    pub opacity: Vec<f32>,
    pub gradient_error: f32,
}

/// Loss, stats and output gradients for one level.
#[derive(Debug, Clone)]
pub struct LevelLoss {
    pub loss: f32,
    pub stats: Stats,
    pub gradients: LevelGradients,
}

#[inline]
fn sign(x: f32) -> f32 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone)]
pub struct LossEvaluator {
    weights: LossWeights,
}

impl LossEvaluator {
    pub fn new(weights: LossWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &LossWeights {
        &self.weights
    }

    fn check_len(level: &str, field: &'static str, got: usize, expected: usize) -> Result<()> {
        if got != expected {
            return Err(TrainError::OutputSize {
                level: level.to_string(),
                field,
                got,
                expected,
            });
        }
        Ok(())
    }

    /// Score `output` against `batch`.
    pub fn evaluate(
        &self,
        batch: &RayBatch,
        output: &LevelOutput,
        level: &str,
        mode: EvalMode,
    ) -> Result<LevelLoss> {
        let n = batch.len();
        Self::check_len(level, "rgb", output.rgb.len(), n)?;
        Self::check_len(level, "opacity", output.opacity.len(), n)?;

        let mut loss = 0.0;
        let mut stats = Stats::new();
        let mut gradients = LevelGradients {
            rgb: vec![Vec3::ZERO; n],
            opacity: vec![0.0; n],
            gradient_error: 0.0,
        };

        if self.weights.rgb > 0.0 {
            let abs_err: Vec<Vec3> = output
                .rgb
                .iter()
                .zip(&batch.rgb)
                .map(|(p, t)| (*p - *t).abs())
                .collect();
            let loss_rgb = match masked_mean(&abs_err, &batch.mask) {
                Some(value) => {
                    let scale = self.weights.rgb / (3.0 * batch.mask.iter().sum::<f32>());
                    for (i, g) in gradients.rgb.iter_mut().enumerate() {
                        let d = output.rgb[i] - batch.rgb[i];
                        *g = Vec3::new(sign(d.x), sign(d.y), sign(d.z)) * (batch.mask[i] * scale);
                    }
                    value
                }
                None => {
                    warn!("Level '{}': empty foreground mask, skipping color loss", level);
                    0.0
                }
            };
            stats.insert("loss_rgb".into(), loss_rgb);
            loss += self.weights.rgb * loss_rgb;
        }

        if self.weights.mask > 0.0 {
            let clamped: Vec<f32> = output
                .opacity
                .iter()
                .map(|o| o.clamp(OPACITY_EPS, 1.0 - OPACITY_EPS))
                .collect();
            let target: Vec<f32> = batch
                .mask
                .iter()
                .map(|&m| if m > 0.5 { 1.0 } else { 0.0 })
                .collect();
            let loss_mask = binary_cross_entropy(&clamped, &target);

            let scale = self.weights.mask / n.max(1) as f32;
            for (i, g) in gradients.opacity.iter_mut().enumerate() {
                let o = output.opacity[i];
                if (OPACITY_EPS..=1.0 - OPACITY_EPS).contains(&o) {
                    *g = scale * (o - target[i]) / (o * (1.0 - o));
                }
            }

            stats.insert("loss_mask".into(), loss_mask);
            loss += self.weights.mask * loss_mask;
        }

        if let Some(gradient_error) = output.gradient_error {
            if self.weights.eikonal > 0.0 {
                stats.insert("loss_eikonal".into(), gradient_error);
                loss += self.weights.eikonal * gradient_error;
                gradients.gradient_error = self.weights.eikonal;
            }
        }

        if let EvalMode::Eval { width, height } = mode {
            if let Some(mpsnr) = psnr(&output.rgb, &batch.rgb, Some(&batch.mask)) {
                stats.insert("mpsnr".into(), mpsnr);
            }
            if let Some(value) = psnr(&output.rgb, &batch.rgb, None) {
                stats.insert("psnr".into(), value);
            }
            stats.insert("ssim".into(), ssim(&output.rgb, &batch.rgb, width, height));
            // Argument order kept as reported historically: mask as input, opacity as target.
            stats.insert(
                "mask_bce".into(),
                binary_cross_entropy(&batch.mask, &output.opacity),
            );
        }

        Ok(LevelLoss {
            loss,
            stats,
            gradients,
        })
    }
}
