use dysdf_data::RayDataset;
use tracing::debug;

use crate::error::Result;
use crate::loss::{EvalMode, LevelGradients};
use crate::model::RenderModel;
use crate::system::{DySdfSystem, PreparedBatch};

/// Summed loss of a training step and the per-level output gradients.
#[derive(Debug, Clone)]
pub struct TrainStepOutput {
    pub loss: f32,
    pub levels: Vec<(String, LevelGradients)>,
}

impl<M: RenderModel, D: RayDataset> DySdfSystem<M, D> {
    /// Render once, score every level and log `train/<level>_<stat>`,
    /// `train/loss` and the model's variables.
    #[tracing::instrument(skip_all, fields(step = self.global_step))]
    pub fn training_step(&mut self, prepared: &PreparedBatch) -> Result<TrainStepOutput> {
        let outputs = self.model.render(&prepared.batch, &prepared.context)?;
        self.levels = outputs.names().map(str::to_string).collect();

        let mut loss = 0.0;
        let mut levels = Vec::with_capacity(outputs.len());
        for (level, output) in outputs.iter() {
            let scored = self
                .evaluator
                .evaluate(&prepared.batch, output, level, EvalMode::Train)?;
            for (key, value) in &scored.stats {
                self.log_scalar(&format!("train/{level}_{key}"), *value as f64);
            }
            loss += scored.loss;
            levels.push((level.to_string(), scored.gradients));
        }

        self.log_scalar("train/loss", loss as f64);
        for (name, value) in self.model.log_variables() {
            self.log_scalar(&format!("train/{name}"), value as f64);
        }
        debug!("Training loss {:.6} over {} levels", loss, levels.len());

        Ok(TrainStepOutput { loss, levels })
    }
}

#[cfg(test)]
mod tests {
    use crate::distributed::WorkerRole;
    use crate::sampling::Stage;
    use crate::system::tests::{test_config, test_system};

    #[test]
    fn test_training_step_sums_levels_and_logs() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut system, sink) =
            test_system(test_config(tmp.path()), WorkerRole::Coordinator, false);
        system.set_global_step(3);
        let prepared = system.preprocess(None, Stage::Train).unwrap();
        let out = system.training_step(&prepared).unwrap();

        // Opacity equals the all-ones mask, clamped to 1 - 1e-3.
        let bce = -(1.0f32 - 1e-3).ln();
        let coarse = 0.2 + 0.1 * bce + 0.01 * 0.3;
        let fine = 0.1 + 0.1 * bce + 0.01 * 0.3;
        assert!((out.loss - (coarse + fine)).abs() < 1e-4);
        assert_eq!(out.levels.len(), 2);
        assert_eq!(out.levels[0].0, "coarse");
        assert_eq!(out.levels[1].1.rgb.len(), 32);
        assert_eq!(system.levels(), ["coarse", "fine"]);

        assert!((sink.last("train/loss").unwrap() - out.loss as f64).abs() < 1e-9);
        assert!((sink.last("train/fine_loss_rgb").unwrap() - 0.1).abs() < 1e-4);
        assert!(sink.last("train/coarse_loss_mask").is_some());
        assert!(sink.last("train/coarse_loss_eikonal").is_some());
        assert_eq!(sink.last("train/inv_s"), Some(64.0));
        assert!(sink.scalars().iter().all(|(_, _, step)| *step == 3));
    }

    #[test]
    fn test_render_context_reaches_model() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = test_config(tmp.path());
        config.model.background = "random".into();
        let (mut system, _) = test_system(config, WorkerRole::Coordinator, false);
        let prepared = system.preprocess(None, Stage::Train).unwrap();
        system.training_step(&prepared).unwrap();
        assert_eq!(system.model().contexts, vec![prepared.context]);
    }

    #[test]
    fn test_workers_do_not_log() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut system, sink) =
            test_system(test_config(tmp.path()), WorkerRole::Worker { rank: 1 }, false);
        let prepared = system.preprocess(None, Stage::Train).unwrap();
        let out = system.training_step(&prepared).unwrap();
        assert!(out.loss > 0.0);
        assert!(sink.scalars().is_empty());
    }
}
