//! Camera ray sampling for training and full-frame evaluation.

use dysdf_data::{Ray, RayDataset, get_rays};
use glam::{UVec2, Vec3};
use rand::Rng;
use tracing::debug;

use crate::config::SamplingConfig;

/// Which loop a batch is prepared for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Train,
    Val,
    Test,
}

impl Stage {
    /// Logging prefix (`train`, `val`, `test`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Train => "train",
            Stage::Val => "val",
            Stage::Test => "test",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rays plus supervision for one step.
///
/// `index` and `frame_id` hold either one entry per ray (training with
/// per-ray image sampling) or a single entry shared by every ray.
#[derive(Debug, Clone, Default)]
pub struct RayBatch {
    /// Dataset image index of each ray, or one shared index.
    pub index: Vec<usize>,
    /// Video frame id matching each entry of `index`.
    pub frame_id: Vec<u32>,
    /// Pixel coordinates of training rays; `None` for full frames.
    pub pixels: Option<Vec<UVec2>>,
    /// World-space rays with unit directions and per-ray time.
    pub rays: Vec<Ray>,
    /// Target color, composited against the step's background.
    pub rgb: Vec<Vec3>,
    /// Foreground mask in `[0, 1]`.
    pub mask: Vec<f32>,
    /// `(width, height)` when the batch covers exactly one full frame.
    pub frame_size: Option<(u32, u32)>,
}

impl RayBatch {
    pub fn len(&self) -> usize {
        self.rays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rays.is_empty()
    }

    /// Dataset index identifying this batch for evaluation outputs.
    pub fn sample_index(&self) -> usize {
        self.index.first().copied().unwrap_or_default()
    }

    /// Frame id of ray `i`, broadcasting a shared id.
    pub fn frame_id_of(&self, i: usize) -> u32 {
        if self.frame_id.len() == 1 {
            self.frame_id[0]
        } else {
            self.frame_id[i]
        }
    }
}

/// Draws training rays and selects evaluation frames.
#[derive(Debug, Clone)]
pub struct RaySampler {
    train_num_rays: usize,
    batch_image_sampling: bool,
}

impl RaySampler {
    pub fn new(train_num_rays: usize, batch_image_sampling: bool) -> Self {
        Self {
            train_num_rays,
            batch_image_sampling,
        }
    }

    pub fn from_config(config: &SamplingConfig) -> Self {
        Self::new(config.train_num_rays, config.batch_image_sampling)
    }

    pub fn train_num_rays(&self) -> usize {
        self.train_num_rays
    }

    /// Build the uncomposited batch for `stage`.
    ///
    /// Without an explicit `index`, training draws `train_num_rays` random
    /// pixels (from per-ray random images when batch image sampling is on,
    /// else from one random image). Any other case renders every pixel of a
    /// single frame: the requested one, or a random one.
    pub fn sample<D: RayDataset, R: Rng + ?Sized>(
        &self,
        dataset: &D,
        index: Option<usize>,
        stage: Stage,
        rng: &mut R,
    ) -> RayBatch {
        let num_images = dataset.num_images();
        match index {
            None if stage == Stage::Train => {
                let indices = if self.batch_image_sampling {
                    (0..self.train_num_rays)
                        .map(|_| rng.gen_range(0..num_images))
                        .collect()
                } else {
                    vec![rng.gen_range(0..num_images)]
                };
                self.sample_pixels(dataset, indices, rng)
            }
            _ => {
                let index = index.unwrap_or_else(|| rng.gen_range(0..num_images));
                self.full_frame(dataset, index)
            }
        }
    }

    fn sample_pixels<D: RayDataset, R: Rng + ?Sized>(
        &self,
        dataset: &D,
        indices: Vec<usize>,
        rng: &mut R,
    ) -> RayBatch {
        let (w, h) = (dataset.width(), dataset.height());
        let n = self.train_num_rays;
        let pixels: Vec<UVec2> = (0..n)
            .map(|_| UVec2::new(rng.gen_range(0..w), rng.gen_range(0..h)))
            .collect();
        let frame_id: Vec<u32> = indices.iter().map(|&i| dataset.frame_id(i)).collect();
        let times: Vec<f32> = frame_id
            .iter()
            .map(|&f| dataset.frame_id_to_time(f))
            .collect();
        let shared = indices.len() == 1;

        let mut rays = Vec::with_capacity(n);
        let mut rgb = Vec::with_capacity(n);
        let mut mask = Vec::with_capacity(n);
        for (i, p) in pixels.iter().enumerate() {
            let k = if shared { 0 } else { i };
            let image = indices[k];
            let c2w = dataset.camera_to_world(image);
            let (origin, direction) = get_rays(dataset.direction(image, p.x, p.y), &c2w);
            rays.push(Ray::new(origin, direction.normalize(), times[k]));
            rgb.push(dataset.rgb(image, p.x, p.y));
            mask.push(dataset.mask(image, p.x, p.y));
        }

        debug!("Sampled {} training rays from {} image(s)", n, indices.len());
        RayBatch {
            index: indices,
            frame_id,
            pixels: Some(pixels),
            rays,
            rgb,
            mask,
            frame_size: None,
        }
    }

    fn full_frame<D: RayDataset>(&self, dataset: &D, index: usize) -> RayBatch {
        let (w, h) = (dataset.width(), dataset.height());
        let frame_id = dataset.frame_id(index);
        let time = dataset.frame_id_to_time(frame_id);
        let c2w = dataset.camera_to_world(index);
        let n = (w * h) as usize;

        let mut rays = Vec::with_capacity(n);
        let mut rgb = Vec::with_capacity(n);
        let mut mask = Vec::with_capacity(n);
        for y in 0..h {
            for x in 0..w {
                let (origin, direction) = get_rays(dataset.direction(index, x, y), &c2w);
                rays.push(Ray::new(origin, direction.normalize(), time));
                rgb.push(dataset.rgb(index, x, y));
                mask.push(dataset.mask(index, x, y));
            }
        }

        RayBatch {
            index: vec![index],
            frame_id: vec![frame_id],
            pixels: None,
            rays,
            rgb,
            mask,
            frame_size: Some((w, h)),
        }
    }
}
