//! Multi-view video frame datasets.
//!
//! [`RayDataset`] is the seam the ray sampler reads through. [`FrameDataset`]
//! is the in-memory implementation: every frame shares one resolution and one
//! pinhole direction template, and carries its own pose, foreground mask and
//! video frame id.

use crate::camera::{PinholeIntrinsics, ray_directions};
use crate::error::{DataError, Result};
use crate::time::TimeRange;
use glam::{Affine3A, Vec3};
use image::{ImageBuffer, Luma, Rgb32FImage};
use tracing::debug;

/// Single-channel float mask with values in `[0, 1]`.
pub type MaskImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Read access to posed frames, as needed to build camera rays.
///
/// `index` is the dataset position of a frame (`0..num_images()`), which is
/// distinct from the video `frame_id` it was captured at. Out-of-range
/// indices or pixel coordinates are a caller error.
pub trait RayDataset {
    /// Number of posed images.
    fn num_images(&self) -> usize;

    /// Frame width in pixels.
    fn width(&self) -> u32;

    /// Frame height in pixels.
    fn height(&self) -> u32;

    /// Camera-space direction through pixel `(x, y)` of image `index`.
    fn direction(&self, index: usize, x: u32, y: u32) -> Vec3;

    /// Camera-to-world pose of image `index`.
    fn camera_to_world(&self, index: usize) -> Affine3A;

    /// Video frame id image `index` was captured at.
    fn frame_id(&self, index: usize) -> u32;

    /// Scene time for a video frame id.
    fn frame_id_to_time(&self, frame_id: u32) -> f32;

    /// Linear RGB of pixel `(x, y)` in image `index`.
    fn rgb(&self, index: usize, x: u32, y: u32) -> Vec3;

    /// Foreground mask value of pixel `(x, y)` in image `index`.
    fn mask(&self, index: usize, x: u32, y: u32) -> f32;
}

/// One posed frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Linear RGB image in `[0, 1]`.
    pub image: Rgb32FImage,
    /// Foreground mask; absent means the whole frame is foreground.
    pub mask: Option<MaskImage>,
    /// Camera-to-world pose.
    pub camera_to_world: Affine3A,
    /// Video frame id this view was captured at.
    pub frame_id: u32,
}

impl Frame {
    pub fn new(image: Rgb32FImage, camera_to_world: Affine3A, frame_id: u32) -> Self {
        Self {
            image,
            mask: None,
            camera_to_world,
            frame_id,
        }
    }

    pub fn with_mask(mut self, mask: MaskImage) -> Self {
        self.mask = Some(mask);
        self
    }
}

/// In-memory dataset of equally sized frames sharing one set of intrinsics.
#[derive(Debug, Clone)]
pub struct FrameDataset {
    frames: Vec<Frame>,
    width: u32,
    height: u32,
    intrinsics: PinholeIntrinsics,
    directions: Vec<Vec3>,
    time_range: TimeRange,
    max_frame_id: u32,
}

impl FrameDataset {
    /// Build a dataset, checking that every frame and mask has the same size.
    pub fn new(frames: Vec<Frame>, intrinsics: PinholeIntrinsics) -> Result<Self> {
        let first = frames.first().ok_or(DataError::Empty)?;
        let (width, height) = first.image.dimensions();
        if width == 0 || height == 0 {
            return Err(DataError::ZeroResolution { width, height });
        }

        for (index, frame) in frames.iter().enumerate() {
            let sizes = std::iter::once(frame.image.dimensions())
                .chain(frame.mask.as_ref().map(|m| m.dimensions()));
            for (got_w, got_h) in sizes {
                if (got_w, got_h) != (width, height) {
                    return Err(DataError::ResolutionMismatch {
                        index,
                        got_w,
                        got_h,
                        want_w: width,
                        want_h: height,
                    });
                }
            }
        }

        let max_frame_id = frames.iter().map(|f| f.frame_id).max().unwrap_or(0);
        let directions = ray_directions(width, height, &intrinsics);
        debug!(
            "Frame dataset: {} frames at {}x{}, frame ids up to {}",
            frames.len(),
            width,
            height,
            max_frame_id
        );

        Ok(Self {
            frames,
            width,
            height,
            intrinsics,
            directions,
            time_range: TimeRange::default(),
            max_frame_id,
        })
    }

    /// Map frame ids onto a different time interval.
    pub fn with_time_range(mut self, time_range: TimeRange) -> Self {
        self.time_range = time_range;
        self
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn intrinsics(&self) -> &PinholeIntrinsics {
        &self.intrinsics
    }

    pub fn time_range(&self) -> TimeRange {
        self.time_range
    }

    /// Highest frame id in the dataset.
    pub fn max_frame_id(&self) -> u32 {
        self.max_frame_id
    }

    fn pixel_offset(&self, x: u32, y: u32) -> usize {
        (y * self.width + x) as usize
    }
}

impl RayDataset for FrameDataset {
    fn num_images(&self) -> usize {
        self.frames.len()
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn direction(&self, _index: usize, x: u32, y: u32) -> Vec3 {
        self.directions[self.pixel_offset(x, y)]
    }

    fn camera_to_world(&self, index: usize) -> Affine3A {
        self.frames[index].camera_to_world
    }

    fn frame_id(&self, index: usize) -> u32 {
        self.frames[index].frame_id
    }

    fn frame_id_to_time(&self, frame_id: u32) -> f32 {
        self.time_range.frame_to_time(frame_id, self.max_frame_id)
    }

    fn rgb(&self, index: usize, x: u32, y: u32) -> Vec3 {
        Vec3::from_array(self.frames[index].image.get_pixel(x, y).0)
    }

    fn mask(&self, index: usize, x: u32, y: u32) -> f32 {
        match &self.frames[index].mask {
            Some(mask) => mask.get_pixel(x, y).0[0],
            None => 1.0,
        }
    }
}
