//! Cross-worker reduction of per-sample evaluation stats.
//!
//! The host gathers every worker's step outputs into a [`GatheredSamples`]
//! before epoch end; the coordinator deduplicates by sample index and
//! averages. Other workers hand the gathered samples back untouched.

use indexmap::IndexMap;
use tracing::debug;

use crate::loss::Stats;

/// Averaged metrics, in the order they first appeared.
pub type Metrics = IndexMap<String, f64>;

/// Which process this system runs as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerRole {
    /// Owns reduction, logging and file writes.
    #[default]
    Coordinator,
    Worker { rank: usize },
}

impl WorkerRole {
    pub fn is_coordinator(&self) -> bool {
        matches!(self, WorkerRole::Coordinator)
    }

    pub fn rank(&self) -> usize {
        match self {
            WorkerRole::Coordinator => 0,
            WorkerRole::Worker { rank } => *rank,
        }
    }
}

/// Stats of one evaluated sample.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalStepOutput {
    pub index: usize,
    pub stats: Stats,
}

/// Every worker's step outputs for one epoch, flattened into one sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GatheredSamples {
    samples: Vec<EvalStepOutput>,
}

impl GatheredSamples {
    /// Outputs of a single process, in step order.
    pub fn from_single_process(samples: Vec<EvalStepOutput>) -> Self {
        Self { samples }
    }

    /// One list of step outputs per worker. Flattened step-major so that
    /// step `j` of every worker precedes step `j + 1` of any worker.
    pub fn from_workers(per_worker: Vec<Vec<EvalStepOutput>>) -> Self {
        let steps = per_worker.iter().map(Vec::len).max().unwrap_or(0);
        let mut iters: Vec<_> = per_worker.into_iter().map(Vec::into_iter).collect();
        let mut samples = Vec::new();
        for _ in 0..steps {
            for it in iters.iter_mut() {
                if let Some(sample) = it.next() {
                    samples.push(sample);
                }
            }
        }
        Self { samples }
    }

    pub fn samples(&self) -> &[EvalStepOutput] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Outcome of epoch-end reduction on one process.
#[derive(Debug, Clone, PartialEq)]
pub enum EpochResult {
    Reduced(Metrics),
    Unreduced(GatheredSamples),
}

impl EpochResult {
    pub fn metrics(&self) -> Option<&Metrics> {
        match self {
            EpochResult::Reduced(m) => Some(m),
            EpochResult::Unreduced(_) => None,
        }
    }
}

fn is_reduced_key(key: &str) -> bool {
    key.contains("loss") || key.contains("metric")
}

/// Average every `loss`/`metric` stat over unique sample indices.
///
/// Metric names come from the first sample. A later sample with the same
/// index replaces the earlier one. A metric missing from some samples is
/// averaged over the samples that have it.
pub fn reduce_metrics(gathered: &GatheredSamples) -> Metrics {
    let Some(first) = gathered.samples.first() else {
        return Metrics::new();
    };
    let keys: Vec<&str> = first
        .stats
        .keys()
        .map(String::as_str)
        .filter(|k| is_reduced_key(k))
        .collect();

    let mut unique: IndexMap<usize, &Stats> = IndexMap::new();
    for sample in &gathered.samples {
        unique.insert(sample.index, &sample.stats);
    }
    debug!(
        "Reducing {} samples ({} unique) over {} metrics",
        gathered.len(),
        unique.len(),
        keys.len()
    );

    let mut metrics = Metrics::new();
    for key in keys {
        let values: Vec<f64> = unique
            .values()
            .filter_map(|stats| stats.get(key))
            .map(|&v| v as f64)
            .collect();
        if !values.is_empty() {
            metrics.insert(key.to_string(), values.iter().sum::<f64>() / values.len() as f64);
        }
    }
    metrics
}

/// Reduce on the coordinator; pass the gathered samples through elsewhere.
pub fn reduce_for_role(role: WorkerRole, gathered: GatheredSamples) -> EpochResult {
    if role.is_coordinator() {
        EpochResult::Reduced(reduce_metrics(&gathered))
    } else {
        EpochResult::Unreduced(gathered)
    }
}
