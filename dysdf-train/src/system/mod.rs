//! Step and epoch drivers for a dynamic SDF reconstruction run.
//!
//! [`DySdfSystem`] owns the sampler, background policy, alpha-ratio schedule
//! and loss evaluator, and calls into a [`RenderModel`] and a [`RayDataset`]
//! supplied by the host. The host owns the optimizer and the epoch loop:
//!
//! 1. [`DySdfSystem::preprocess`] builds a composited batch and render context
//! 2. [`DySdfSystem::training_step`] / [`DySdfSystem::validation_step`] /
//!    [`DySdfSystem::test_step`] consume it
//! 3. the host gathers evaluation outputs from every worker and calls
//!    [`DySdfSystem::validation_epoch_end`] or [`DySdfSystem::test_epoch_end`]

mod epoch;
mod eval;
mod train;

pub use train::TrainStepOutput;

use dysdf_data::RayDataset;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info};

use crate::config::SystemConfig;
use crate::distributed::WorkerRole;
use crate::error::{Result, TrainError};
use crate::export::OutputDir;
use crate::log::LogSink;
use crate::loss::LossEvaluator;
use crate::model::{RenderContext, RenderModel};
use crate::sampling::{
    AlphaRatioSchedule, BackgroundPolicy, RayBatch, RaySampler, Stage, composite,
};

/// A composited batch and the renderer inputs for the same step.
#[derive(Debug, Clone)]
pub struct PreparedBatch {
    pub batch: RayBatch,
    pub context: RenderContext,
}

pub struct DySdfSystem<M, D> {
    config: SystemConfig,
    model: M,
    dataset: D,
    sink: Box<dyn LogSink>,
    output: OutputDir,
    role: WorkerRole,
    sampler: RaySampler,
    background: BackgroundPolicy,
    alpha_ratio: AlphaRatioSchedule,
    evaluator: LossEvaluator,
    rng: StdRng,
    global_step: u64,
    /// Level names of the most recent forward pass.
    levels: Vec<String>,
}

impl<M: RenderModel, D: RayDataset> DySdfSystem<M, D> {
    /// Build a system, rejecting unsupported policies up front.
    pub fn new(
        config: SystemConfig,
        model: M,
        dataset: D,
        sink: Box<dyn LogSink>,
        role: WorkerRole,
    ) -> Result<Self> {
        let background: BackgroundPolicy = config.model.background.parse()?;
        let alpha_ratio = AlphaRatioSchedule::from_config(config.model.alpha_ratio.as_ref())?;
        if dataset.num_images() == 0 {
            return Err(TrainError::EmptyDataset);
        }
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(role.rank() as u64)),
            None => StdRng::from_entropy(),
        };

        info!(
            "Built system: {} images at {}x{}, background {:?}, alpha ratio {:?}, rank {}",
            dataset.num_images(),
            dataset.width(),
            dataset.height(),
            background,
            alpha_ratio,
            role.rank()
        );

        Ok(Self {
            sampler: RaySampler::from_config(&config.model.sampling),
            evaluator: LossEvaluator::new(config.system.loss),
            output: OutputDir::new(config.output.save_dir.clone()),
            config,
            model,
            dataset,
            sink,
            role,
            background,
            alpha_ratio,
            rng,
            global_step: 0,
            levels: Vec::new(),
        })
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn dataset(&self) -> &D {
        &self.dataset
    }

    pub fn output(&self) -> &OutputDir {
        &self.output
    }

    pub fn role(&self) -> WorkerRole {
        self.role
    }

    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    pub fn global_step(&self) -> u64 {
        self.global_step
    }

    pub fn set_global_step(&mut self, step: u64) {
        self.global_step = step;
    }

    /// Called by the host after each optimizer step.
    pub fn advance_step(&mut self) {
        self.global_step += 1;
    }

    /// Current alpha ratio for the renderer.
    pub fn alpha_ratio(&self) -> f32 {
        self.alpha_ratio.ratio(self.global_step)
    }

    /// Sample rays for `stage` and composite their targets.
    ///
    /// `index` selects one full frame. Without it, training draws random
    /// pixels and evaluation draws one random frame.
    pub fn preprocess(&mut self, index: Option<usize>, stage: Stage) -> Result<PreparedBatch> {
        let len = self.dataset.num_images();
        if let Some(index) = index {
            if index >= len {
                return Err(TrainError::IndexOutOfRange { index, len });
            }
        }

        let mut batch = self.sampler.sample(&self.dataset, index, stage, &mut self.rng);
        let background_color = self.background.color(stage, &mut self.rng);
        composite(&mut batch.rgb, &batch.mask, background_color);

        let context = RenderContext {
            background_color,
            alpha_ratio: self.alpha_ratio(),
            stage,
        };
        debug!(
            "Prepared {} batch of {} rays (alpha ratio {:.4})",
            stage,
            batch.len(),
            context.alpha_ratio
        );
        Ok(PreparedBatch { batch, context })
    }

    fn log_scalar(&self, key: &str, value: f64) {
        if self.role.is_coordinator() {
            self.sink.log_scalar(key, value, self.global_step);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{AlphaRatioConfig, LoggerConfig, LoggerKind, LossWeights};
    use crate::export::VisImage;
    use crate::log::MemorySink;
    use crate::model::{LevelOutput, LevelOutputs};
    use crate::sampling::sampler::tests::tagged_dataset;
    use dysdf_data::FrameDataset;
    use glam::Vec3;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    /// Renders the composited target with a fixed color offset per level.
    #[derive(Default)]
    pub(crate) struct MockModel {
        pub contexts: Vec<RenderContext>,
        pub isosurface_calls: Vec<(PathBuf, f32, u32, u32)>,
        pub with_normals: bool,
    }

    impl RenderModel for MockModel {
        fn render(&mut self, batch: &RayBatch, context: &RenderContext) -> Result<LevelOutputs> {
            self.contexts.push(*context);
            let level = |offset: f32| {
                let mut out = LevelOutput::new(
                    batch.rgb.iter().map(|c| *c + Vec3::splat(offset)).collect(),
                    batch.mask.clone(),
                )
                .with_depth(vec![2.0; batch.len()])
                .with_gradient_error(0.3);
                if self.with_normals {
                    out = out.with_normal(vec![Vec3::Z; batch.len()]);
                }
                out
            };
            Ok(LevelOutputs::new()
                .with_level("coarse", level(0.2))
                .with_level("fine", level(0.1)))
        }

        fn log_variables(&self) -> Vec<(String, f32)> {
            vec![("inv_s".to_string(), 64.0)]
        }

        fn isosurface(
            &mut self,
            path: &Path,
            time: f32,
            frame_id: u32,
            resolution: u32,
        ) -> Result<()> {
            self.isosurface_calls
                .push((path.to_path_buf(), time, frame_id, resolution));
            std::fs::write(path, b"ply\n")?;
            Ok(())
        }

        fn extra_visualizations(&self, batch: &RayBatch, _output: &LevelOutput) -> Vec<VisImage> {
            let (w, h) = batch.frame_size.unwrap_or((0, 0));
            vec![VisImage::rgb(vec![Vec3::ZERO; batch.len()], w, h)]
        }
    }

    pub(crate) fn test_config(save_dir: &Path) -> SystemConfig {
        let mut config = SystemConfig::default();
        config.seed = Some(7);
        config.model.sampling.train_num_rays = 32;
        config.model.isosurface.resolution = 16;
        config.system.loss = LossWeights::new(1.0, 0.1, 0.01);
        config.output.save_dir = save_dir.to_path_buf();
        config.logger = LoggerConfig {
            kind: LoggerKind::None,
            dir: None,
        };
        config
    }

    pub(crate) type TestSystem = DySdfSystem<MockModel, FrameDataset>;

    pub(crate) fn test_system(
        config: SystemConfig,
        role: WorkerRole,
        accept_images: bool,
    ) -> (TestSystem, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new(accept_images));
        let system = DySdfSystem::new(
            config,
            MockModel::default(),
            tagged_dataset(4, 6, 4),
            Box::new(sink.clone()),
            role,
        )
        .unwrap();
        (system, sink)
    }

    #[test]
    fn test_unknown_background_fails_at_construction() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = test_config(tmp.path());
        config.model.background = "checkerboard".into();
        let err = DySdfSystem::new(
            config,
            MockModel::default(),
            tagged_dataset(1, 2, 2),
            Box::new(MemorySink::default()),
            WorkerRole::Coordinator,
        )
        .err()
        .unwrap();
        assert!(matches!(
            err,
            TrainError::Unsupported { what: "background policy", .. }
        ));
    }

    #[test]
    fn test_unknown_alpha_strategy_fails_at_construction() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = test_config(tmp.path());
        config.model.alpha_ratio = Some(AlphaRatioConfig {
            strategy: "cosine".into(),
            max_steps: 10,
        });
        let err = DySdfSystem::new(
            config,
            MockModel::default(),
            tagged_dataset(1, 2, 2),
            Box::new(MemorySink::default()),
            WorkerRole::Coordinator,
        )
        .err()
        .unwrap();
        assert!(matches!(err, TrainError::Unsupported { .. }));
    }

    #[test]
    fn test_preprocess_train_and_eval_shapes() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut system, _) = test_system(test_config(tmp.path()), WorkerRole::Coordinator, false);

        let train = system.preprocess(None, Stage::Train).unwrap();
        assert_eq!(train.batch.len(), 32);
        assert_eq!(train.context.stage, Stage::Train);

        let val = system.preprocess(Some(2), Stage::Val).unwrap();
        assert_eq!(val.batch.len(), 24);
        assert_eq!(val.batch.frame_size, Some((6, 4)));
        assert_eq!(val.context.background_color, Vec3::ONE);
    }

    #[test]
    fn test_preprocess_composites_against_background() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = test_config(tmp.path());
        config.model.background = "black".into();
        let (mut system, _) = test_system(config, WorkerRole::Coordinator, false);
        let prepared = system.preprocess(None, Stage::Train).unwrap();
        assert_eq!(prepared.context.background_color, Vec3::ZERO);
        // Tagged frames have no mask, so targets are untouched.
        for (i, c) in prepared.batch.rgb.iter().enumerate() {
            assert_eq!(c.x, prepared.batch.index[i] as f32 / 100.0);
        }
    }

    #[test]
    fn test_alpha_ratio_follows_step() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = test_config(tmp.path());
        config.model.alpha_ratio = Some(AlphaRatioConfig {
            strategy: "interpolated".into(),
            max_steps: 100,
        });
        let (mut system, _) = test_system(config, WorkerRole::Coordinator, false);
        assert_eq!(system.preprocess(None, Stage::Train).unwrap().context.alpha_ratio, 0.0);
        system.set_global_step(50);
        assert_eq!(system.preprocess(None, Stage::Train).unwrap().context.alpha_ratio, 0.5);
        system.set_global_step(500);
        system.advance_step();
        assert_eq!(system.global_step(), 501);
        assert_eq!(system.alpha_ratio(), 1.0);
    }

    #[test]
    fn test_out_of_range_index_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut system, _) = test_system(test_config(tmp.path()), WorkerRole::Coordinator, false);
        assert!(matches!(
            system.preprocess(Some(4), Stage::Test),
            Err(TrainError::IndexOutOfRange { index: 4, len: 4 })
        ));
    }
}
