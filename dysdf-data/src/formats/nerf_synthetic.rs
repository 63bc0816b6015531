//! Blender/NeRF-synthetic style `transforms.json` loading.
//!
//! Frames are RGBA PNGs; the alpha channel becomes the foreground mask and
//! the color is kept unblended so the background policy can be applied at
//! sampling time. An optional per-frame `frame_id` selects the video frame;
//! without it frames are numbered in file order.

use crate::camera::PinholeIntrinsics;
use crate::dataset::{Frame, FrameDataset, MaskImage};
use crate::error::{DataError, Result};
use glam::{Affine3A, Mat4};
use image::{Luma, Rgb, Rgb32FImage};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{info, warn};

#[derive(Deserialize, Debug)]
struct TransformsFile {
    camera_angle_x: f32,
    frames: Vec<FrameEntry>,
}

#[derive(Deserialize, Debug)]
struct FrameEntry {
    file_path: String,
    transform_matrix: Vec<Vec<f32>>,
    #[serde(default)]
    frame_id: Option<u32>,
}

fn parse_pose(rows: &[Vec<f32>], index: usize) -> Result<Affine3A> {
    if rows.len() != 4 || rows.iter().any(|r| r.len() != 4) {
        return Err(DataError::InvalidData(format!(
            "transform_matrix of frame {} is not 4x4",
            index
        )));
    }
    let flat: Vec<f32> = rows.iter().flatten().copied().collect();
    // Rows in the file, glam is column-major.
    let pose = Mat4::from_cols_slice(&flat).transpose();
    Ok(Affine3A::from_mat4(pose))
}

fn load_frame(base: &Path, entry: &FrameEntry, index: usize) -> Result<Frame> {
    let mut image_path = base.join(&entry.file_path);
    if image_path.extension().is_none() {
        image_path.set_extension("png");
    }
    let rgba = image::open(&image_path)?.into_rgba32f();
    let (w, h) = rgba.dimensions();

    let mut rgb = Rgb32FImage::new(w, h);
    let mut mask = MaskImage::new(w, h);
    for (x, y, px) in rgba.enumerate_pixels() {
        let [r, g, b, a] = px.0;
        rgb.put_pixel(x, y, Rgb([r, g, b]));
        mask.put_pixel(x, y, Luma([a]));
    }

    let frame_id = entry.frame_id.unwrap_or(index as u32);
    Ok(Frame::new(rgb, parse_pose(&entry.transform_matrix, index)?, frame_id).with_mask(mask))
}

/// Load `<dir>/<transforms_name>` and every frame it references.
#[tracing::instrument(skip_all, fields(dir = %dir.as_ref().display()))]
pub fn load_transforms_dir(dir: impl AsRef<Path>, transforms_name: &str) -> Result<FrameDataset> {
    let dir = dir.as_ref();
    let reader = BufReader::new(File::open(dir.join(transforms_name))?);
    let transforms: TransformsFile = serde_json::from_reader(reader)?;

    if transforms.frames.is_empty() {
        warn!("{} lists no frames", transforms_name);
        return Err(DataError::Empty);
    }

    let frames = transforms
        .frames
        .iter()
        .enumerate()
        .map(|(i, entry)| load_frame(dir, entry, i))
        .collect::<Result<Vec<_>>>()?;

    let (w, h) = frames[0].image.dimensions();
    let intrinsics = PinholeIntrinsics::from_fov_x(transforms.camera_angle_x, w, h);
    info!("Loaded {} frames ({}x{}) from {}", frames.len(), w, h, transforms_name);

    FrameDataset::new(frames, intrinsics)
}
