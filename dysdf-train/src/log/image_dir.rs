use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::RgbImage;
use serde::Serialize;
use tracing::warn;

use crate::error::Result;
use crate::log::LogSink;

#[derive(Serialize)]
struct ScalarRecord<'a> {
    step: u64,
    key: &'a str,
    value: f64,
}

/// Scalars as JSON lines in `scalars.jsonl`; images as PNG under `images/`.
pub struct ImageDirSink {
    dir: PathBuf,
    scalars: Mutex<BufWriter<File>>,
}

impl ImageDirSink {
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(dir.join("images"))?;
        let file = File::options()
            .create(true)
            .append(true)
            .open(dir.join("scalars.jsonl"))?;
        Ok(Self {
            dir,
            scalars: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn image_path(&self, key: &str, step: u64) -> PathBuf {
        let name = key.replace(['/', '\\'], "_");
        self.dir.join("images").join(format!("{name}_{step:06}.png"))
    }
}

impl LogSink for ImageDirSink {
    fn log_scalar(&self, key: &str, value: f64, step: u64) {
        let record = ScalarRecord { step, key, value };
        let Ok(mut writer) = self.scalars.lock() else {
            return;
        };
        let written = serde_json::to_writer(&mut *writer, &record)
            .map_err(std::io::Error::from)
            .and_then(|_| writer.write_all(b"\n"));
        if let Err(e) = written {
            warn!("Failed to write scalar {}: {}", key, e);
        }
    }

    fn supports_images(&self) -> bool {
        true
    }

    fn log_image(&self, key: &str, image: &RgbImage, _caption: &str, step: u64) -> Result<()> {
        image.save(self.image_path(key, step))?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        if let Ok(mut writer) = self.scalars.lock() {
            writer.flush()?;
        }
        Ok(())
    }
}

impl Drop for ImageDirSink {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars_written_as_json_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = ImageDirSink::create(tmp.path()).unwrap();
        sink.log_scalar("train/loss", 0.25, 1);
        sink.log_scalar("val/psnr", 30.0, 2);
        sink.flush().unwrap();

        let text = std::fs::read_to_string(tmp.path().join("scalars.jsonl")).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["key"], "train/loss");
        assert_eq!(lines[1]["step"], 2);
    }

    #[test]
    fn test_image_saved_under_sanitized_key() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = ImageDirSink::create(tmp.path()).unwrap();
        sink.log_image("val/fine_renderings", &RgbImage::new(3, 2), "renderings", 12)
            .unwrap();
        assert!(tmp.path().join("images/val_fine_renderings_000012.png").exists());
    }
}
