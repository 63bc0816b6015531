//! Single-host run loop.
//!
//! Every worker is an independent [`DySdfSystem`] with its own model copy.
//! After each step the workers' albedo gradients are averaged and applied to
//! every copy, keeping them in sync. Evaluation frames are split round-robin
//! across workers and their outputs gathered before epoch end, as a
//! multi-process host would.

use std::path::PathBuf;

use dysdf_data::{DataError, FrameDataset, load_transforms_dir};
use dysdf_train::config::LossWeights;
use dysdf_train::log::NoOpSink;
use dysdf_train::{
    DySdfSystem, EpochResult, EvalStepOutput, GatheredSamples, Metrics, Stage, SystemConfig,
    TrainError, WorkerRole, build_sink,
};
use glam::Vec3;
use thiserror::Error;
use tracing::info;

use crate::synthetic::{SphereModel, orbit_dataset};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Train(#[from] TrainError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),
}

/// Where frames come from.
#[derive(Debug, Clone)]
pub enum DataSource {
    /// `transforms_*.json` plus RGBA frames on disk.
    Transforms { dir: PathBuf, split: String },
    /// Rendered breathing sphere.
    Synthetic { views: usize, width: u32, height: u32 },
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config: Option<PathBuf>,
    pub data: DataSource,
    pub save_dir: Option<PathBuf>,
    pub steps: u64,
    pub learning_rate: f32,
    pub workers: usize,
    pub val_every: u64,
}

/// Final state of a finished run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub albedo: Vec3,
    pub last_train_loss: f32,
    pub test_metrics: Metrics,
}

type System = DySdfSystem<SphereModel, FrameDataset>;

fn load_config(options: &RunOptions) -> Result<SystemConfig, AppError> {
    let mut config = match &options.config {
        Some(path) => {
            info!("Loading config from {}", path.display());
            SystemConfig::from_yaml_file(path)?
        }
        None => {
            let mut config = SystemConfig::default();
            config.system.loss = LossWeights::new(1.0, 0.1, 0.01);
            config
        }
    };
    if let Some(dir) = &options.save_dir {
        config.output.save_dir = dir.clone();
    }
    Ok(config)
}

fn load_dataset(source: &DataSource) -> Result<FrameDataset, AppError> {
    Ok(match source {
        DataSource::Transforms { dir, split } => {
            load_transforms_dir(dir, &format!("transforms_{split}.json"))?
        }
        DataSource::Synthetic {
            views,
            width,
            height,
        } => orbit_dataset(*views, *width, *height)?,
    })
}

fn build_workers(
    config: &SystemConfig,
    dataset: FrameDataset,
    workers: usize,
) -> Result<Vec<System>, AppError> {
    let model = SphereModel::default();
    (0..workers)
        .map(|rank| -> Result<System, AppError> {
            let (role, sink) = if rank == 0 {
                (WorkerRole::Coordinator, build_sink(&config.logger)?)
            } else {
                let sink: Box<dyn dysdf_train::LogSink> = Box::new(NoOpSink);
                (WorkerRole::Worker { rank }, sink)
            };
            Ok(DySdfSystem::new(
                config.clone(),
                model.clone(),
                dataset.clone(),
                sink,
                role,
            )?)
        })
        .collect()
}

/// One synchronized optimizer step across all workers.
fn train_step(workers: &mut [System], learning_rate: f32) -> Result<f32, AppError> {
    let mut gradient = Vec3::ZERO;
    let mut loss = 0.0;
    for system in workers.iter_mut() {
        let prepared = system.preprocess(None, Stage::Train)?;
        let out = system.training_step(&prepared)?;
        gradient += system.model().albedo_gradient(&out.levels);
        loss += out.loss;
    }
    let n = workers.len() as f32;
    for system in workers.iter_mut() {
        system.model_mut().apply_gradient(gradient / n, learning_rate);
        system.advance_step();
    }
    Ok(loss / n)
}

/// Run `stage` over every frame, frames split round-robin across workers.
fn evaluate(workers: &mut [System], stage: Stage) -> Result<Option<Metrics>, AppError> {
    let num_images = workers
        .first()
        .map(|s| dysdf_data::RayDataset::num_images(s.dataset()))
        .unwrap_or(0);
    let mut per_worker: Vec<Vec<EvalStepOutput>> = vec![Vec::new(); workers.len()];
    for index in 0..num_images {
        let rank = index % workers.len();
        let system = &mut workers[rank];
        let prepared = system.preprocess(Some(index), stage)?;
        let out = match stage {
            Stage::Test => system.test_step(&prepared)?,
            _ => system.validation_step(&prepared)?,
        };
        per_worker[rank].push(out);
    }

    let gathered = GatheredSamples::from_workers(per_worker);
    let mut metrics = None;
    for system in workers.iter_mut() {
        let result = match stage {
            Stage::Test => system.test_epoch_end(gathered.clone())?,
            _ => system.validation_epoch_end(gathered.clone(), stage)?,
        };
        if let EpochResult::Reduced(m) = result {
            metrics = Some(m);
        }
    }
    Ok(metrics)
}

pub fn run(options: RunOptions) -> Result<RunSummary, AppError> {
    if options.workers == 0 {
        return Err(AppError::InvalidArgs("at least one worker is required".into()));
    }
    let config = load_config(&options)?;
    let dataset = load_dataset(&options.data)?;
    let mut workers = build_workers(&config, dataset, options.workers)?;
    info!(
        "Training for {} steps on {} worker(s), saving to {}",
        options.steps,
        options.workers,
        config.output.save_dir.display()
    );

    let mut last_train_loss = 0.0;
    for step in 1..=options.steps {
        last_train_loss = train_step(&mut workers, options.learning_rate)?;
        if options.val_every > 0 && step % options.val_every == 0 {
            if let Some(metrics) = evaluate(&mut workers, Stage::Val)? {
                info!("Step {}: {} validation metrics", step, metrics.len());
            }
        }
    }

    let test_metrics = evaluate(&mut workers, Stage::Test)?.unwrap_or_default();
    for (key, value) in &test_metrics {
        info!("test/{} = {:.6}", key, value);
    }

    Ok(RunSummary {
        albedo: workers[0].model().albedo(),
        last_train_loss,
        test_metrics,
    })
}
