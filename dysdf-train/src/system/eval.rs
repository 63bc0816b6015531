use dysdf_data::RayDataset;
use glam::Vec3;
use tracing::{debug, info};

use crate::distributed::EvalStepOutput;
use crate::error::{Result, TrainError};
use crate::export::{Colormap, VisImage};
use crate::loss::{EvalMode, Stats};
use crate::model::{LevelOutput, RenderModel};
use crate::sampling::Stage;
use crate::system::{DySdfSystem, PreparedBatch};

/// Shaded normals over the background, using opacity as alpha.
fn normal_panel(
    output: &LevelOutput,
    normal: &[Vec3],
    background: Vec3,
    width: u32,
    height: u32,
) -> VisImage {
    let data = normal
        .iter()
        .zip(&output.opacity)
        .map(|(n, &op)| (Vec3::splat(0.5) + 0.5 * *n) * op + background * (1.0 - op))
        .collect();
    VisImage::rgb(data, width, height)
}

impl<M: RenderModel, D: RayDataset> DySdfSystem<M, D> {
    /// Render one full frame, score every level and save its visualization grid.
    ///
    /// Stats are keyed `<level>_<stat>` plus `<level>_loss`. At the test stage
    /// the ground truth, prediction and normals are also saved as separate
    /// images for sequence export.
    #[tracing::instrument(skip_all, fields(step = self.global_step, index = prepared.batch.sample_index()))]
    pub fn validation_step(&mut self, prepared: &PreparedBatch) -> Result<EvalStepOutput> {
        let batch = &prepared.batch;
        let (width, height) = batch.frame_size.ok_or(TrainError::NotFullFrame)?;
        let prefix = prepared.context.stage.as_str();
        let step = self.global_step;
        let index = batch.sample_index();
        let file_name = format!("{index:06}");

        let outputs = self.model.render(batch, &prepared.context)?;
        self.levels = outputs.names().map(str::to_string).collect();

        let mut stats = Stats::new();
        for (level, output) in outputs.iter() {
            let scored = self.evaluator.evaluate(
                batch,
                output,
                level,
                EvalMode::Eval { width, height },
            )?;
            for (key, value) in &scored.stats {
                stats.insert(format!("{level}_{key}"), *value);
            }
            stats.insert(format!("{level}_loss"), scored.loss);

            let run_dir = format!("it{step:06}-{prefix}_{level}");
            let is_test = prepared.context.stage == Stage::Test;

            let gt = VisImage::rgb(batch.rgb.clone(), width, height);
            let pred = VisImage::rgb(output.rgb.clone(), width, height);
            if is_test {
                self.output
                    .save_image(format!("rgb_gt/{run_dir}/{file_name}.png"), &gt)?;
                self.output
                    .save_image(format!("rgb/{run_dir}/{file_name}.png"), &pred)?;
            }

            let mut panels = vec![gt, pred];
            panels.extend(self.model.extra_visualizations(batch, output));
            if let Some(normal) = &output.normal {
                let panel = normal_panel(
                    output,
                    normal,
                    prepared.context.background_color,
                    width,
                    height,
                );
                if is_test {
                    self.output
                        .save_image(format!("normal/{run_dir}/{file_name}.png"), &panel)?;
                }
                panels.push(panel);
            }
            if let Some(depth) = &output.depth {
                panels.push(VisImage::grayscale(
                    depth.clone(),
                    width,
                    height,
                    None,
                    Colormap::Jet,
                ));
            }
            panels.push(VisImage::grayscale(
                output.opacity.clone(),
                width,
                height,
                Some((0.0, 1.0)),
                Colormap::Gray,
            ));

            let grid = self
                .output
                .save_image_grid(format!("{run_dir}/{file_name}.png"), &panels)?;
            if self.role.is_coordinator() && self.sink.supports_images() {
                self.sink.log_image(
                    &format!("{prefix}/{level}_renderings"),
                    &grid,
                    "renderings",
                    step,
                )?;
            }
        }

        debug!("Evaluated sample {} with {} stats", index, stats.len());
        Ok(EvalStepOutput { index, stats })
    }

    /// Extract this frame's mesh unless it already exists, then run the
    /// test-stage validation step.
    pub fn test_step(&mut self, prepared: &PreparedBatch) -> Result<EvalStepOutput> {
        let frame_id = prepared
            .batch
            .frame_id
            .first()
            .copied()
            .ok_or(TrainError::NotFullFrame)?;
        let mesh_path = self.output.save_path(format!(
            "meshes/it{:06}/{frame_id:06}.ply",
            self.global_step
        ))?;
        // Concurrent workers may race on the same path; both write the same mesh.
        if !mesh_path.exists() {
            let time = self.dataset.frame_id_to_time(frame_id);
            let resolution = self.config.model.isosurface.resolution;
            info!(
                "Extracting mesh for frame {} (t = {:.4}) at resolution {}",
                frame_id, time, resolution
            );
            self.model
                .isosurface(&mesh_path, time, frame_id, resolution)?;
        }
        self.validation_step(prepared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributed::WorkerRole;
    use crate::system::tests::{test_config, test_system};

    #[test]
    fn test_validation_stats_and_grid() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut system, sink) =
            test_system(test_config(tmp.path()), WorkerRole::Coordinator, true);
        system.set_global_step(12);
        let prepared = system.preprocess(Some(1), Stage::Val).unwrap();
        let out = system.validation_step(&prepared).unwrap();

        assert_eq!(out.index, 1);
        for key in [
            "coarse_loss_rgb",
            "coarse_loss_mask",
            "coarse_loss_eikonal",
            "coarse_mpsnr",
            "coarse_psnr",
            "coarse_ssim",
            "coarse_mask_bce",
            "coarse_loss",
            "fine_loss",
        ] {
            assert!(out.stats.contains_key(key), "missing {key}");
        }
        assert!((out.stats["fine_psnr"] - 20.0).abs() < 1e-2);

        // gt, pred, extra, depth, opacity panels side by side.
        let grid = image::open(tmp.path().join("it000012-val_fine/000001.png"))
            .unwrap()
            .to_rgb8();
        assert_eq!(grid.dimensions(), (6 * 5, 4));
        assert!(!tmp.path().join("rgb").exists());

        let images = sink.images();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].key, "val/coarse_renderings");
        assert_eq!(images[0].caption, "renderings");
        assert_eq!(images[1].step, 12);
    }

    #[test]
    fn test_training_batch_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut system, _) = test_system(test_config(tmp.path()), WorkerRole::Coordinator, false);
        let prepared = system.preprocess(None, Stage::Train).unwrap();
        assert!(matches!(
            system.validation_step(&prepared),
            Err(TrainError::NotFullFrame)
        ));
    }

    #[test]
    fn test_test_step_saves_separate_images() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut system, _) = test_system(test_config(tmp.path()), WorkerRole::Coordinator, false);
        system.model_mut().with_normals = true;
        let prepared = system.preprocess(Some(2), Stage::Test).unwrap();
        system.test_step(&prepared).unwrap();

        let root = tmp.path();
        assert!(root.join("rgb_gt/it000000-test_fine/000002.png").exists());
        assert!(root.join("rgb/it000000-test_coarse/000002.png").exists());
        let normal = image::open(root.join("normal/it000000-test_fine/000002.png"))
            .unwrap()
            .to_rgb8();
        // +Z normal at full opacity shades to (0.5, 0.5, 1.0).
        assert_eq!(normal.get_pixel(0, 0).0, [128, 128, 255]);
        let grid = image::open(root.join("it000000-test_fine/000002.png")).unwrap();
        assert_eq!(grid.width(), 6 * 6);
    }

    #[test]
    fn test_mesh_extracted_once_per_frame() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut system, _) = test_system(test_config(tmp.path()), WorkerRole::Coordinator, false);
        system.set_global_step(40);
        let prepared = system.preprocess(Some(3), Stage::Test).unwrap();
        system.test_step(&prepared).unwrap();
        system.test_step(&prepared).unwrap();

        let calls = &system.model().isosurface_calls;
        assert_eq!(calls.len(), 1);
        let (path, time, frame_id, resolution) = &calls[0];
        assert_eq!(*path, tmp.path().join("meshes/it000040/000009.ply"));
        assert_eq!(*frame_id, 9);
        assert_eq!(*resolution, 16);
        assert_eq!(*time, 1.0);
    }

    #[test]
    fn test_worker_saves_images_without_logging() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut system, sink) =
            test_system(test_config(tmp.path()), WorkerRole::Worker { rank: 2 }, true);
        let prepared = system.preprocess(Some(0), Stage::Val).unwrap();
        system.validation_step(&prepared).unwrap();
        assert!(tmp.path().join("it000000-val_coarse/000000.png").exists());
        assert!(sink.images().is_empty());
    }
}
