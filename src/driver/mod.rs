//! Benchmark driver: the experiment loop around the multiplication core.
//!
//! For every configured size and repetition it generates two random square
//! matrices, times one multiplication and appends a [`TrialRecord`]. A
//! record that cannot be written is logged and dropped; the run goes on.

pub mod sink;

use std::time::Instant;

use thiserror::Error;

use crate::config::BenchConfig;
use crate::distributed::{DistributedError, DistributedMultiplier};
use crate::group::{Group, GroupError};
use crate::matrix::{self, Kernel, MatrixError};

pub use sink::{CsvSink, SinkError, TrialRecord};

const MIB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Matrix(#[from] MatrixError),

    #[error(transparent)]
    Distributed(#[from] DistributedError),

    #[error(transparent)]
    Group(#[from] GroupError),
}

/// Outcome of a full run, as seen by one participant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Trials this participant took part in.
    pub trials: usize,
    /// Records written to the result file (coordinator only).
    pub written: usize,
    /// Records lost to I/O errors (coordinator only).
    pub dropped: usize,
}

/// Approximate working set of one trial in MiB: three `size × size`
/// matrices of `f64`, split evenly over `participants` when there are any.
///
/// This is a rough figure for plotting, not an accounting of real usage.
pub fn approx_memory_mb(size: usize, participants: usize) -> f64 {
    let bytes = 3.0 * (size * size) as f64 * std::mem::size_of::<f64>() as f64;
    bytes / MIB / participants.max(1) as f64
}

/// Times one sequential multiplication of two random `size × size` matrices.
pub fn sequential_trial(size: usize, kernel: Kernel) -> Result<TrialRecord, DriverError> {
    let a = matrix::generate(size, size)?;
    let b = matrix::generate(size, size)?;

    let start = Instant::now();
    let _c = matrix::multiply_with(kernel, &a, &b)?;
    let elapsed = start.elapsed().as_secs_f64();

    Ok(TrialRecord {
        size,
        time_seconds: elapsed,
        memory_mb: approx_memory_mb(size, 1),
        participants: 0,
    })
}

/// Times one distributed multiplication. Every participant must call this
/// for the same `size`; only the coordinator gets a record back.
///
/// The clock starts after a barrier, so all participants begin together,
/// and stops at the coordinator once the gather completes.
pub fn distributed_trial<G: Group>(
    multiplier: &DistributedMultiplier<G>,
    size: usize,
) -> Result<Option<TrialRecord>, DriverError> {
    let group = multiplier.group();
    let operands = if group.is_coordinator() {
        Some((matrix::generate(size, size)?, matrix::generate(size, size)?))
    } else {
        None
    };

    group.barrier()?;
    let start = Instant::now();
    let product = multiplier.multiply(operands.as_ref().map(|(a, b)| (a, b)))?;
    let elapsed = start.elapsed().as_secs_f64();

    Ok(product.map(|_| TrialRecord {
        size,
        time_seconds: elapsed,
        memory_mb: approx_memory_mb(size, group.size()),
        participants: group.size(),
    }))
}

/// Runs every configured trial sequentially, appending to
/// [`BenchConfig::sequential_path`].
pub fn run_sequential(config: &BenchConfig) -> Result<RunSummary, DriverError> {
    log::info!("Running sequential tests...");
    let sink = open_sink(config.sequential_path());
    let mut summary = RunSummary::default();

    for &size in &config.sizes {
        for _ in 0..config.repetitions {
            let record = sequential_trial(size, config.kernel)?;
            log::info!(
                "Sequential - Matrix size: {}x{}, time: {:.6} s, memory: {:.2} MB",
                size,
                size,
                record.time_seconds,
                record.memory_mb
            );
            summary.trials += 1;
            store(&sink, &record, &mut summary);
        }
    }
    Ok(summary)
}

/// Runs every configured trial across the multiplier's group. The
/// coordinator appends to [`BenchConfig::parallel_path`]; the other
/// participants only compute.
pub fn run_distributed<G: Group>(
    multiplier: &DistributedMultiplier<G>,
    config: &BenchConfig,
) -> Result<RunSummary, DriverError> {
    let group = multiplier.group();
    let sink = group
        .is_coordinator()
        .then(|| open_sink(config.parallel_path(group.size())));
    if group.is_coordinator() {
        log::info!("Running parallel tests with {} processes...", group.size());
    }

    let mut summary = RunSummary::default();
    for &size in &config.sizes {
        for _ in 0..config.repetitions {
            let record = distributed_trial(multiplier, size)?;
            summary.trials += 1;

            if let (Some(record), Some(sink)) = (record, sink.as_ref()) {
                log::info!(
                    "Distributed - Matrix size: {}x{}, processes: {}, time: {:.6} s, memory per process: {:.2} MB",
                    size,
                    size,
                    record.participants,
                    record.time_seconds,
                    record.memory_mb
                );
                store(sink, &record, &mut summary);
            }
        }
    }
    Ok(summary)
}

/// Runs the benchmark on one participant of the multiplier's group.
///
/// A group of one has nobody to distribute to: it runs the sequential
/// trials and records them in the sequential file with participant count
/// `0`. Larger groups go through [`run_distributed`].
pub fn run_group<G: Group>(
    multiplier: &DistributedMultiplier<G>,
    config: &BenchConfig,
) -> Result<RunSummary, DriverError> {
    if multiplier.group().size() == 1 {
        return run_sequential(config);
    }
    run_distributed(multiplier, config)
}

fn open_sink(path: std::path::PathBuf) -> CsvSink {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if let Err(e) = std::fs::create_dir_all(dir) {
            log::error!("Cannot create {}: {}", dir.display(), e);
        }
    }
    CsvSink::new(path)
}

fn store(sink: &CsvSink, record: &TrialRecord, summary: &mut RunSummary) {
    match sink.append(record) {
        Ok(()) => summary.written += 1,
        Err(e) => {
            log::error!("{}; result dropped", e);
            summary.dropped += 1;
        }
    }
}
