//! Scalar and image logging backends.
//!
//! The backend is chosen once from [`LoggerConfig`]; callers ask
//! [`LogSink::supports_images`] instead of probing the logger at runtime.

mod image_dir;
mod sink;

pub use image_dir::ImageDirSink;
pub use sink::{CompositeSink, ImageRecord, LogSink, MemorySink, NoOpSink, TracingSink};

use crate::config::{LoggerConfig, LoggerKind};
use crate::error::{Result, TrainError};

/// Build the sink described by `config`.
pub fn build_sink(config: &LoggerConfig) -> Result<Box<dyn LogSink>> {
    match config.kind {
        LoggerKind::Console => Ok(Box::new(TracingSink)),
        LoggerKind::None => Ok(Box::new(NoOpSink)),
        LoggerKind::ImageDir => {
            let dir = config.dir.as_ref().ok_or_else(|| {
                TrainError::InvalidConfig("logger.dir is required for image_dir".into())
            })?;
            let sinks: Vec<Box<dyn LogSink>> =
                vec![Box::new(TracingSink), Box::new(ImageDirSink::create(dir)?)];
            Ok(Box::new(CompositeSink::new(sinks)))
        }
    }
}
