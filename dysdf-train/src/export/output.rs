use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::debug;

use crate::error::Result;
use crate::export::grid::{VisImage, image_grid};

/// Root of everything a run writes to disk.
#[derive(Debug, Clone)]
pub struct OutputDir {
    root: PathBuf,
}

impl OutputDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `relative` under the root, creating its parent directories.
    pub fn save_path(&self, relative: impl AsRef<Path>) -> Result<PathBuf> {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(path)
    }

    /// Resolve `relative` under the root without touching the filesystem.
    pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    /// Concatenate `panels` left to right and save as PNG.
    pub fn save_image_grid(
        &self,
        relative: impl AsRef<Path>,
        panels: &[VisImage],
    ) -> Result<RgbImage> {
        let grid = image_grid(panels);
        let path = self.save_path(relative)?;
        grid.save(&path)?;
        debug!("Saved {}x{} grid to {}", grid.width(), grid.height(), path.display());
        Ok(grid)
    }

    /// Save a single panel as PNG.
    pub fn save_image(&self, relative: impl AsRef<Path>, image: &VisImage) -> Result<()> {
        let path = self.save_path(relative)?;
        image.to_rgb8().save(path)?;
        Ok(())
    }
}
