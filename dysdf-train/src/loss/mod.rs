//! Per-level losses and evaluation metrics.

pub mod criterions;
pub mod evaluator;

pub use evaluator::{EvalMode, LevelGradients, LevelLoss, LossEvaluator, Stats};
