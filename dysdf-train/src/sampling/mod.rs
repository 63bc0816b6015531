//! Batch preparation: ray sampling, background compositing and the
//! alpha-ratio schedule.

pub mod background;
pub mod sampler;
pub mod schedule;

pub use background::{BackgroundPolicy, composite};
pub use sampler::{RayBatch, RaySampler, Stage};
pub use schedule::AlphaRatioSchedule;
