//! Pinhole camera model and world-space ray generation.

use glam::{Affine3A, Vec3};

/// Pinhole intrinsics in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinholeIntrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
}

impl PinholeIntrinsics {
    pub fn new(fx: f32, fy: f32, cx: f32, cy: f32) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// Intrinsics for a centered principal point and a horizontal field of view.
    pub fn from_fov_x(fov_x: f32, width: u32, height: u32) -> Self {
        let focal = fov_to_focal(fov_x, width);
        Self::new(focal, focal, width as f32 * 0.5, height as f32 * 0.5)
    }

    /// Camera-space direction through the center of pixel `(x, y)`.
    ///
    /// OpenGL convention: the camera looks down -Z with +Y up.
    pub fn direction(&self, x: u32, y: u32) -> Vec3 {
        Vec3::new(
            (x as f32 + 0.5 - self.cx) / self.fx,
            -(y as f32 + 0.5 - self.cy) / self.fy,
            -1.0,
        )
    }
}

/// Focal length in pixels for a field of view spanning `pixels`.
pub fn fov_to_focal(fov: f32, pixels: u32) -> f32 {
    0.5 * pixels as f32 / (0.5 * fov).tan()
}

/// Per-pixel camera-space direction template, row-major `(y, x)`.
pub fn ray_directions(width: u32, height: u32, intrinsics: &PinholeIntrinsics) -> Vec<Vec3> {
    (0..height)
        .flat_map(|y| (0..width).map(move |x| intrinsics.direction(x, y)))
        .collect()
}

/// Rotate a camera-space direction into world space.
///
/// Returns `(origin, direction)`; the direction keeps the length of the
/// template and is normalized by the caller.
pub fn get_rays(direction: Vec3, camera_to_world: &Affine3A) -> (Vec3, Vec3) {
    (
        Vec3::from(camera_to_world.translation),
        camera_to_world.transform_vector3(direction),
    )
}
