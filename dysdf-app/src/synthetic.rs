//! A time-varying sphere scene and an analytic renderer for it.
//!
//! The scene is a sphere at the origin whose radius breathes over the clip,
//! filmed by a camera orbiting once around it, one frame per view. The
//! renderer knows the geometry and learns only the surface albedo, which is
//! enough to drive every training and export path end to end.

use std::f32::consts::TAU;
use std::path::Path;

use dysdf_data::dataset::MaskImage;
use dysdf_data::{
    Frame, FrameDataset, PinholeIntrinsics, Ray, extract_isosurface, get_rays, write_mesh_ply,
};
use dysdf_train::export::{Colormap, VisImage};
use dysdf_train::{
    LevelGradients, LevelOutput, LevelOutputs, RayBatch, RenderContext, RenderModel,
};
use glam::{Affine3A, Vec3};
use image::{Luma, Rgb, Rgb32FImage};
use tracing::{debug, info};

/// Albedo the synthetic frames are rendered with.
pub const TRUE_ALBEDO: Vec3 = Vec3::new(0.8, 0.45, 0.2);

const CAMERA_DISTANCE: f32 = 3.0;
const FOV_X: f32 = 0.69;
const LIGHT_DIR: Vec3 = Vec3::new(0.4, 0.8, 0.45);
/// Edge width of the soft silhouette at the start of training.
const BASE_SOFTNESS: f32 = 0.05;
/// Grid half-extent for mesh extraction.
const BOUND: f32 = 1.0;

/// Sphere radius at normalized time `t`.
pub fn radius_at(time: f32) -> f32 {
    0.5 + 0.15 * (TAU * time).sin()
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Geometry of one ray against the sphere at the ray's time.
struct Hit {
    /// Signed distance from the sphere surface to the ray's closest point.
    distance: f32,
    normal: Vec3,
    depth: f32,
    shade: f32,
}

fn trace(ray: &Ray) -> Hit {
    let radius = radius_at(ray.time);
    let t_closest = (-ray.origin).dot(ray.direction).max(0.0);
    let closest = ray.at(t_closest);
    let offset = closest.length();
    let distance = offset - radius;

    let (point, depth) = if distance < 0.0 {
        let t_hit = t_closest - (radius * radius - offset * offset).max(0.0).sqrt();
        (ray.at(t_hit), t_hit)
    } else {
        (closest, t_closest)
    };
    let normal = point.normalize_or_zero();
    let shade = 0.3 + 0.7 * normal.dot(LIGHT_DIR.normalize()).max(0.0);
    Hit {
        distance,
        normal,
        depth,
        shade,
    }
}

/// Camera-to-world pose of view `i` out of `n` on a circular orbit.
fn orbit_pose(i: usize, n: usize) -> Affine3A {
    let angle = TAU * i as f32 / n as f32;
    let eye = Vec3::new(
        CAMERA_DISTANCE * angle.sin(),
        0.6,
        CAMERA_DISTANCE * angle.cos(),
    );
    Affine3A::look_at_rh(eye, Vec3::ZERO, Vec3::Y).inverse()
}

/// Render `views` frames of the breathing sphere, frame `i` at view `i`.
pub fn orbit_dataset(views: usize, width: u32, height: u32) -> dysdf_data::Result<FrameDataset> {
    let intrinsics = PinholeIntrinsics::from_fov_x(FOV_X, width, height);
    let max_frame = views.saturating_sub(1).max(1) as f32;
    let frames = (0..views)
        .map(|i| {
            let c2w = orbit_pose(i, views);
            let time = i as f32 / max_frame;
            let mut image = Rgb32FImage::new(width, height);
            let mut mask = MaskImage::new(width, height);
            for y in 0..height {
                for x in 0..width {
                    let (origin, direction) = get_rays(intrinsics.direction(x, y), &c2w);
                    let hit = trace(&Ray::new(origin, direction.normalize(), time));
                    if hit.distance < 0.0 {
                        image.put_pixel(x, y, Rgb((TRUE_ALBEDO * hit.shade).to_array()));
                        mask.put_pixel(x, y, Luma([1.0]));
                    }
                }
            }
            Frame::new(image, c2w, i as u32).with_mask(mask)
        })
        .collect();
    info!("Rendered {} synthetic views at {}x{}", views, width, height);
    FrameDataset::new(frames, intrinsics)
}

/// Analytic sphere renderer with a learnable albedo.
///
/// Two levels share the albedo: `coarse` renders a wider silhouette edge
/// than `fine`. The edge sharpens as the alpha ratio grows.
#[derive(Debug, Clone)]
pub struct SphereModel {
    albedo: Vec3,
    softness: f32,
    /// `shade * opacity` per ray and level from the last render.
    coverage: Vec<(String, Vec<f32>)>,
}

impl Default for SphereModel {
    fn default() -> Self {
        Self::new(Vec3::splat(0.5))
    }
}

impl SphereModel {
    pub fn new(albedo: Vec3) -> Self {
        Self {
            albedo,
            softness: BASE_SOFTNESS,
            coverage: Vec::new(),
        }
    }

    pub fn albedo(&self) -> Vec3 {
        self.albedo
    }

    /// Gradient of the loss with respect to the albedo, summed over levels.
    pub fn albedo_gradient(&self, levels: &[(String, LevelGradients)]) -> Vec3 {
        let mut grad = Vec3::ZERO;
        for (name, level) in levels {
            let Some((_, coverage)) = self.coverage.iter().find(|(n, _)| n == name) else {
                continue;
            };
            for (g, c) in level.rgb.iter().zip(coverage) {
                grad += *g * *c;
            }
        }
        grad
    }

    /// Plain gradient descent on the albedo, kept in `[0, 1]`.
    pub fn apply_gradient(&mut self, gradient: Vec3, learning_rate: f32) {
        self.albedo = (self.albedo - gradient * learning_rate).clamp(Vec3::ZERO, Vec3::ONE);
    }

    fn render_level(
        &self,
        batch: &RayBatch,
        context: &RenderContext,
        softness: f32,
    ) -> (LevelOutput, Vec<f32>) {
        let n = batch.len();
        let mut rgb = Vec::with_capacity(n);
        let mut opacity = Vec::with_capacity(n);
        let mut normal = Vec::with_capacity(n);
        let mut depth = Vec::with_capacity(n);
        let mut coverage = Vec::with_capacity(n);
        for ray in &batch.rays {
            let hit = trace(ray);
            let op = sigmoid(-hit.distance / softness);
            rgb.push(self.albedo * hit.shade * op + context.background_color * (1.0 - op));
            opacity.push(op);
            normal.push(hit.normal);
            depth.push(hit.depth);
            coverage.push(hit.shade * op);
        }
        // Exact SDF: the gradient norm is 1 everywhere.
        let output = LevelOutput::new(rgb, opacity)
            .with_normal(normal)
            .with_depth(depth)
            .with_gradient_error(0.0);
        (output, coverage)
    }
}

impl RenderModel for SphereModel {
    fn render(
        &mut self,
        batch: &RayBatch,
        context: &RenderContext,
    ) -> dysdf_train::Result<LevelOutputs> {
        self.softness = BASE_SOFTNESS * (1.0 - 0.9 * context.alpha_ratio);
        let (coarse, coarse_cov) = self.render_level(batch, context, 2.0 * self.softness);
        let (fine, fine_cov) = self.render_level(batch, context, self.softness);
        self.coverage = vec![("coarse".into(), coarse_cov), ("fine".into(), fine_cov)];
        Ok(LevelOutputs::new()
            .with_level("coarse", coarse)
            .with_level("fine", fine))
    }

    fn log_variables(&self) -> Vec<(String, f32)> {
        vec![
            ("softness".to_string(), self.softness),
            ("albedo_error".to_string(), (self.albedo - TRUE_ALBEDO).length()),
        ]
    }

    fn isosurface(
        &mut self,
        path: &Path,
        time: f32,
        frame_id: u32,
        resolution: u32,
    ) -> dysdf_train::Result<()> {
        let radius = radius_at(time);
        let mesh = extract_isosurface(
            |p| p.length() - radius,
            Vec3::splat(-BOUND),
            Vec3::splat(BOUND),
            resolution,
        );
        debug!(
            "Frame {}: {} vertices, {} faces at r = {:.3}",
            frame_id,
            mesh.vertex_count(),
            mesh.face_count(),
            radius
        );
        write_mesh_ply(&mesh, path)?;
        Ok(())
    }

    fn extra_visualizations(&self, batch: &RayBatch, output: &LevelOutput) -> Vec<VisImage> {
        let Some((width, height)) = batch.frame_size else {
            return Vec::new();
        };
        let error = output
            .rgb
            .iter()
            .zip(&batch.rgb)
            .map(|(p, t)| (*p - *t).abs().max_element())
            .collect();
        vec![VisImage::grayscale(
            error,
            width,
            height,
            Some((0.0, 0.5)),
            Colormap::Jet,
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dysdf_data::RayDataset;
    use dysdf_train::Stage;

    #[test]
    fn test_radius_breathes() {
        assert_eq!(radius_at(0.0), 0.5);
        assert!((radius_at(0.25) - 0.65).abs() < 1e-6);
        assert!((radius_at(0.75) - 0.35).abs() < 1e-6);
    }

    #[test]
    fn test_orbit_dataset_sees_sphere() {
        let ds = orbit_dataset(4, 16, 12).unwrap();
        assert_eq!(ds.num_images(), 4);
        assert_eq!(ds.frame_id(3), 3);
        assert_eq!(ds.frame_id_to_time(3), 1.0);
        for i in 0..4 {
            // Center pixel looks at the origin, corners miss.
            assert_eq!(ds.mask(i, 8, 6), 1.0);
            assert_eq!(ds.mask(i, 0, 0), 0.0);
            assert!(ds.rgb(i, 8, 6).length() > 0.0);
        }
    }

    #[test]
    fn test_orbit_cameras_face_origin() {
        let c2w = orbit_pose(1, 8);
        let forward = c2w.transform_vector3(Vec3::NEG_Z);
        let to_origin = (-Vec3::from(c2w.translation)).normalize();
        assert!(forward.dot(to_origin) > 0.999);
    }

    fn full_frame_batch(ds: &FrameDataset, index: usize) -> RayBatch {
        let sampler = dysdf_train::sampling::RaySampler::new(1, true);
        let mut rng = rand::thread_rng();
        sampler.sample(ds, Some(index), Stage::Val, &mut rng)
    }

    fn context(alpha_ratio: f32) -> RenderContext {
        RenderContext {
            background_color: Vec3::ONE,
            alpha_ratio,
            stage: Stage::Val,
        }
    }

    #[test]
    fn test_render_levels_and_fields() {
        let ds = orbit_dataset(2, 8, 6).unwrap();
        let batch = full_frame_batch(&ds, 0);
        let mut model = SphereModel::default();
        let out = model.render(&batch, &context(1.0)).unwrap();
        assert_eq!(out.names().collect::<Vec<_>>(), vec!["coarse", "fine"]);
        let fine = out.get("fine").unwrap();
        assert_eq!(fine.rgb.len(), 48);
        assert!(fine.normal.is_some());
        assert!(fine.depth.is_some());
        assert_eq!(fine.gradient_error, Some(0.0));
        assert!(fine.opacity.iter().all(|o| (0.0..=1.0).contains(o)));
    }

    #[test]
    fn test_alpha_ratio_sharpens_edges() {
        let ds = orbit_dataset(2, 8, 6).unwrap();
        let batch = full_frame_batch(&ds, 0);
        let mut model = SphereModel::default();
        model.render(&batch, &context(0.0)).unwrap();
        let early = model.softness;
        model.render(&batch, &context(1.0)).unwrap();
        assert!(model.softness < early);
        assert_eq!(model.log_variables()[0].0, "softness");
    }

    #[test]
    fn test_albedo_gradient_points_towards_truth() {
        let ds = orbit_dataset(2, 16, 12).unwrap();
        let batch = full_frame_batch(&ds, 1);
        let mut model = SphereModel::new(Vec3::splat(0.2));
        let out = model.render(&batch, &context(1.0)).unwrap();

        let evaluator = dysdf_train::LossEvaluator::new(dysdf_train::config::LossWeights::new(
            1.0, 0.0, 0.0,
        ));
        let levels: Vec<_> = out
            .iter()
            .map(|(name, level)| {
                let scored = evaluator
                    .evaluate(&batch, level, name, dysdf_train::loss::EvalMode::Train)
                    .unwrap();
                (name.to_string(), scored.gradients)
            })
            .collect();
        let grad = model.albedo_gradient(&levels);
        // Red is furthest below the target, so it must be pushed up.
        assert!(grad.x < 0.0);
        let before = (model.albedo() - TRUE_ALBEDO).length();
        model.apply_gradient(grad, 0.1);
        assert!((model.albedo() - TRUE_ALBEDO).length() < before);
    }

    #[test]
    fn test_isosurface_writes_mesh() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("000000.ply");
        let mut model = SphereModel::default();
        model.isosurface(&path, 0.0, 0, 12).unwrap();
        let vertices = dysdf_data::load_vertices_from_ply(&path).unwrap();
        assert!(!vertices.is_empty());
        for v in vertices {
            assert!((v.position.length() - 0.5).abs() < 0.05);
        }
    }
}
