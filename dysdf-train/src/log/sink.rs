use std::sync::Mutex;

use image::RgbImage;
use tracing::info;

use crate::error::Result;

/// Destination for training scalars and rendered images.
pub trait LogSink: Send + Sync {
    fn log_scalar(&self, key: &str, value: f64, step: u64);

    /// Whether [`LogSink::log_image`] stores anything.
    fn supports_images(&self) -> bool {
        false
    }

    fn log_image(&self, _key: &str, _image: &RgbImage, _caption: &str, _step: u64) -> Result<()> {
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Emits scalars as `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log_scalar(&self, key: &str, value: f64, step: u64) {
        info!(target: "dysdf::metrics", step, key, value, "scalar");
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpSink;

impl LogSink for NoOpSink {
    fn log_scalar(&self, _key: &str, _value: f64, _step: u64) {}
}

/// Fans out to several sinks.
pub struct CompositeSink {
    sinks: Vec<Box<dyn LogSink>>,
}

impl CompositeSink {
    pub fn new(sinks: Vec<Box<dyn LogSink>>) -> Self {
        Self { sinks }
    }
}

impl LogSink for CompositeSink {
    fn log_scalar(&self, key: &str, value: f64, step: u64) {
        for sink in &self.sinks {
            sink.log_scalar(key, value, step);
        }
    }

    fn supports_images(&self) -> bool {
        self.sinks.iter().any(|s| s.supports_images())
    }

    fn log_image(&self, key: &str, image: &RgbImage, caption: &str, step: u64) -> Result<()> {
        for sink in self.sinks.iter().filter(|s| s.supports_images()) {
            sink.log_image(key, image, caption, step)?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        for sink in &self.sinks {
            sink.flush()?;
        }
        Ok(())
    }
}

/// Logged image metadata kept by [`MemorySink`].
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub key: String,
    pub caption: String,
    pub step: u64,
    pub width: u32,
    pub height: u32,
}

/// Keeps everything in memory. Used by drivers that inspect their own logs.
#[derive(Debug, Default)]
pub struct MemorySink {
    scalars: Mutex<Vec<(String, f64, u64)>>,
    images: Mutex<Vec<ImageRecord>>,
    accept_images: bool,
}

impl MemorySink {
    pub fn new(accept_images: bool) -> Self {
        Self {
            accept_images,
            ..Default::default()
        }
    }

    pub fn scalars(&self) -> Vec<(String, f64, u64)> {
        self.scalars.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Latest value logged under `key`.
    pub fn last(&self, key: &str) -> Option<f64> {
        self.scalars()
            .into_iter()
            .rev()
            .find(|(k, _, _)| k == key)
            .map(|(_, v, _)| v)
    }

    pub fn images(&self) -> Vec<ImageRecord> {
        self.images.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl LogSink for MemorySink {
    fn log_scalar(&self, key: &str, value: f64, step: u64) {
        if let Ok(mut scalars) = self.scalars.lock() {
            scalars.push((key.to_string(), value, step));
        }
    }

    fn supports_images(&self) -> bool {
        self.accept_images
    }

    fn log_image(&self, key: &str, image: &RgbImage, caption: &str, step: u64) -> Result<()> {
        if let Ok(mut images) = self.images.lock() {
            images.push(ImageRecord {
                key: key.to_string(),
                caption: caption.to_string(),
                step,
                width: image.width(),
                height: image.height(),
            });
        }
        Ok(())
    }
}

impl<T: LogSink + ?Sized> LogSink for std::sync::Arc<T> {
    fn log_scalar(&self, key: &str, value: f64, step: u64) {
        (**self).log_scalar(key, value, step)
    }

    fn supports_images(&self) -> bool {
        (**self).supports_images()
    }

    fn log_image(&self, key: &str, image: &RgbImage, caption: &str, step: u64) -> Result<()> {
        (**self).log_image(key, image, caption, step)
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_composite_forwards_scalars() {
        let a = Arc::new(MemorySink::new(false));
        let b = Arc::new(MemorySink::new(true));
        let composite = CompositeSink::new(vec![Box::new(a.clone()), Box::new(b.clone())]);
        composite.log_scalar("train/loss", 0.5, 3);
        assert_eq!(a.last("train/loss"), Some(0.5));
        assert_eq!(b.scalars(), vec![("train/loss".to_string(), 0.5, 3)]);
    }

    #[test]
    fn test_composite_images_only_to_capable_sinks() {
        let a = Arc::new(MemorySink::new(false));
        let b = Arc::new(MemorySink::new(true));
        let composite = CompositeSink::new(vec![Box::new(a.clone()), Box::new(b.clone())]);
        assert!(composite.supports_images());
        composite
            .log_image("val/fine_renderings", &RgbImage::new(2, 1), "renderings", 7)
            .unwrap();
        assert!(a.images().is_empty());
        assert_eq!(b.images().len(), 1);
        assert_eq!(b.images()[0].caption, "renderings");
    }

    #[test]
    fn test_noop_has_no_images() {
        assert!(!NoOpSink.supports_images());
        assert!(!TracingSink.supports_images());
    }
}
