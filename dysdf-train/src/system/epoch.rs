use dysdf_data::RayDataset;
use tracing::info;

use crate::distributed::{EpochResult, GatheredSamples, reduce_for_role};
use crate::error::Result;
use crate::export::{save_image_sequence, write_results_yaml};
use crate::model::RenderModel;
use crate::sampling::Stage;
use crate::system::DySdfSystem;

impl<M: RenderModel, D: RayDataset> DySdfSystem<M, D> {
    /// Reduce gathered evaluation outputs and log `<stage>/<metric>`.
    ///
    /// Only the coordinator reduces; other workers get the samples back.
    pub fn validation_epoch_end(
        &mut self,
        gathered: GatheredSamples,
        stage: Stage,
    ) -> Result<EpochResult> {
        let result = reduce_for_role(self.role, gathered);
        if let EpochResult::Reduced(metrics) = &result {
            for (key, value) in metrics {
                self.log_scalar(&format!("{stage}/{key}"), *value);
            }
            info!(
                "{} epoch at step {}: {} metrics reduced",
                stage,
                self.global_step,
                metrics.len()
            );
            self.sink.flush()?;
        }
        Ok(result)
    }

    /// Reduce test outputs, write the results file and assemble one
    /// render sequence per level.
    pub fn test_epoch_end(&mut self, gathered: GatheredSamples) -> Result<EpochResult> {
        let result = self.validation_epoch_end(gathered, Stage::Test)?;
        if let EpochResult::Reduced(metrics) = &result {
            let step = self.global_step;
            let results_path = self.output.path(format!("results_it{step:06}-test.yaml"));
            write_results_yaml(
                &results_path,
                metrics.iter().map(|(k, v)| (k.as_str(), *v)),
            )?;

            for level in &self.levels {
                let run_dir = format!("it{step:06}-test_{level}");
                let frames = self.output.path(&run_dir);
                if !frames.is_dir() {
                    continue;
                }
                save_image_sequence(
                    &frames,
                    &self.output.path(format!("{run_dir}.gif")),
                    self.config.output.sequence_fps,
                )?;
            }
        }
        Ok(result)
    }
}
