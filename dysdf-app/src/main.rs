//! DySDF
//!
//! Command-line driver for dynamic SDF reconstruction runs.
//!
//! Trains the analytic sphere renderer against a synthetic breathing-sphere
//! clip or a `transforms_*.json` dataset, then runs validation and test
//! epochs that write meshes, render grids, sequences and a results file.

mod app;
mod synthetic;

use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use app::{DataSource, RunOptions};

/// DySDF - dynamic SDF training and evaluation
#[derive(Parser, Debug)]
#[command(name = "dysdf")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML run configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dataset directory with transforms_<split>.json; synthetic when absent
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Dataset split to load from --data
    #[arg(long, default_value = "train")]
    split: String,

    /// Output directory, overriding output.save_dir
    #[arg(short, long)]
    save_dir: Option<PathBuf>,

    /// Optimizer steps
    #[arg(long, default_value_t = 200)]
    steps: u64,

    /// Albedo learning rate
    #[arg(long, default_value_t = 0.1)]
    lr: f32,

    /// Simulated workers
    #[arg(short, long, default_value_t = 1)]
    workers: usize,

    /// Steps between validation epochs (0 disables)
    #[arg(long, default_value_t = 100)]
    val_every: u64,

    /// Synthetic views and frame size
    #[arg(long, default_value_t = 24)]
    views: usize,
    #[arg(long, default_value_t = 64)]
    width: u32,
    #[arg(long, default_value_t = 48)]
    height: u32,

    /// Log level used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .init();
}

fn main() {
    let args = Args::parse();
    init_logging(&args.log_level);

    let data = match args.data {
        Some(dir) => DataSource::Transforms {
            dir,
            split: args.split,
        },
        None => DataSource::Synthetic {
            views: args.views,
            width: args.width,
            height: args.height,
        },
    };
    let options = RunOptions {
        config: args.config,
        data,
        save_dir: args.save_dir,
        steps: args.steps,
        learning_rate: args.lr,
        workers: args.workers,
        val_every: args.val_every,
    };

    match app::run(options) {
        Ok(summary) => info!(
            "Finished: albedo {:?} (target {:?}), last training loss {:.6}, {} test metrics",
            summary.albedo,
            synthetic::TRUE_ALBEDO,
            summary.last_train_loss,
            summary.test_metrics.len()
        ),
        Err(e) => {
            eprintln!("Application error: {}", e);
            std::process::exit(1);
        }
    }
}
