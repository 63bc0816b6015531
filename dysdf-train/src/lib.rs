//! DySDF Training Crate
//!
//! Training and evaluation control for dynamic neural SDF reconstruction:
//! ray sampling, background compositing, multi-level losses, step drivers
//! and cross-worker metric reduction around an external renderer.
//!
//! ## Modules
//!
//! - [`sampling`]: ray batches, background policy, alpha-ratio schedule
//! - [`loss`]: criterions and the per-level loss evaluator
//! - [`system`]: training, validation and test step drivers
//! - [`distributed`]: gathered samples and metric reduction
//! - [`log`]: scalar/image logging sinks
//! - [`export`]: image grids, render sequences and result files

pub mod config;
pub mod distributed;
pub mod error;
pub mod export;
pub mod log;
pub mod loss;
pub mod model;
pub mod sampling;
pub mod system;

pub use config::SystemConfig;
pub use distributed::{EpochResult, EvalStepOutput, GatheredSamples, Metrics, WorkerRole};
pub use error::{Result, TrainError};
pub use log::{LogSink, build_sink};
pub use loss::{LevelGradients, LossEvaluator, Stats};
pub use model::{LevelOutput, LevelOutputs, RenderContext, RenderModel};
pub use sampling::{RayBatch, Stage};
pub use system::{DySdfSystem, PreparedBatch, TrainStepOutput};
