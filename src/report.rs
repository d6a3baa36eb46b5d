//! Summaries of recorded results: per-size timing statistics and time
//! distributions, and the speedup and efficiency of each participant count
//! against the sequential baseline.
//!
//! Medians are used throughout, so a few slow outliers (first-touch page
//! faults, a busy machine) don't skew the comparison.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::driver::TrialRecord;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("cannot list {path}: {source}")]
    List {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Bins in the time distribution of every [`SizeSummary`].
pub const HISTOGRAM_BINS: usize = 30;

/// Timing statistics for one matrix size.
#[derive(Debug, Clone, PartialEq)]
pub struct SizeSummary {
    pub size: usize,
    pub participants: usize,
    pub count: usize,
    pub min: f64,
    pub median: f64,
    pub mean: f64,
    pub max: f64,
    pub distribution: Histogram,
}

/// Equal-width bins over a sample of times, in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// Left edge of the first bin.
    pub low: f64,
    pub width: f64,
    pub counts: Vec<usize>,
}

impl Histogram {
    /// Right edge of the last bin.
    pub fn high(&self) -> f64 {
        self.low + self.width * self.counts.len() as f64
    }
}

/// Parallel median against sequential median for one size and participant
/// count.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeedupRow {
    pub size: usize,
    pub participants: usize,
    pub sequential_median: f64,
    pub parallel_median: f64,
    pub speedup: f64,
    pub efficiency: f64,
}

/// Reads every record of a headerless results file.
pub fn load_records(path: &Path) -> Result<Vec<TrialRecord>, ReportError> {
    let read_err = |source| ReportError::Read {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(read_err)?;
    reader
        .deserialize()
        .collect::<Result<Vec<TrialRecord>, _>>()
        .map_err(read_err)
}

/// Every `parallel_results_<P>proc.csv` in `dir`, sorted by name.
pub fn discover_parallel_files(dir: &Path) -> Result<Vec<PathBuf>, ReportError> {
    let entries = std::fs::read_dir(dir).map_err(|source| ReportError::List {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_prefix("parallel_results_"))
                .and_then(|rest| rest.strip_suffix("proc.csv"))
                .is_some_and(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Groups records by (size, participants) and summarises each group,
/// ordered by participant count then size.
pub fn summarize(records: &[TrialRecord]) -> Vec<SizeSummary> {
    group_times(records)
        .into_iter()
        .map(|((participants, size), mut times)| {
            let median = median(&mut times);
            let min = times.iter().copied().fold(f64::INFINITY, f64::min);
            let max = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            SizeSummary {
                size,
                participants,
                count: times.len(),
                min,
                median,
                mean: times.iter().sum::<f64>() / times.len() as f64,
                max,
                distribution: histogram(&times, HISTOGRAM_BINS),
            }
        })
        .collect()
}

/// Speedup (`sequential median / parallel median`) and efficiency
/// (`speedup / participants`) for every size present in both inputs.
pub fn speedup_table(sequential: &[TrialRecord], parallel: &[TrialRecord]) -> Vec<SpeedupRow> {
    let mut baseline: BTreeMap<usize, f64> = BTreeMap::new();
    for ((_, size), mut times) in group_times(sequential) {
        baseline.insert(size, median(&mut times));
    }

    group_times(parallel)
        .into_iter()
        .filter(|((participants, _), _)| *participants > 0)
        .filter_map(|((participants, size), mut times)| {
            let sequential_median = *baseline.get(&size)?;
            let parallel_median = median(&mut times);
            let speedup = sequential_median / parallel_median;
            Some(SpeedupRow {
                size,
                participants,
                sequential_median,
                parallel_median,
                speedup,
                efficiency: speedup / participants as f64,
            })
        })
        .collect()
}

/// Splits `[min, max]` of `times` into `bins` equal bins and counts the
/// samples in each. The last bin includes its right edge. A sample with no
/// spread is centred in a range one second wide.
///
/// # Panics
///
/// Panics if `bins` is zero.
pub fn histogram(times: &[f64], bins: usize) -> Histogram {
    assert!(bins > 0, "a histogram needs at least one bin");
    let mut counts = vec![0; bins];
    if times.is_empty() {
        return Histogram {
            low: 0.0,
            width: 0.0,
            counts,
        };
    }

    let mut low = times.iter().copied().fold(f64::INFINITY, f64::min);
    let mut high = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if low == high {
        low -= 0.5;
        high += 0.5;
    }
    let width = (high - low) / bins as f64;

    for &t in times {
        let bin = ((t - low) / width) as usize;
        counts[bin.min(bins - 1)] += 1;
    }
    Histogram { low, width, counts }
}

fn group_times(records: &[TrialRecord]) -> BTreeMap<(usize, usize), Vec<f64>> {
    let mut groups: BTreeMap<(usize, usize), Vec<f64>> = BTreeMap::new();
    for r in records {
        groups
            .entry((r.participants, r.size))
            .or_default()
            .push(r.time_seconds);
    }
    groups
}

/// Median of a non-empty sample; the mean of the middle pair for even
/// lengths.
fn median(times: &mut [f64]) -> f64 {
    times.sort_by(f64::total_cmp);
    let mid = times.len() / 2;
    if times.len() % 2 == 0 {
        (times[mid - 1] + times[mid]) / 2.0
    } else {
        times[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(size: usize, time: f64, participants: usize) -> TrialRecord {
        TrialRecord {
            size,
            time_seconds: time,
            memory_mb: 0.0,
            participants,
        }
    }

    #[test]
    fn median_of_odd_and_even() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&mut [4.0, 1.0, 3.0, 2.0]), 2.5);
    }

    #[test]
    fn summarize_groups_by_size() {
        let records = [rec(10, 1.0, 0), rec(10, 3.0, 0), rec(10, 2.0, 0), rec(20, 5.0, 0)];
        let summary = summarize(&records);

        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].size, 10);
        assert_eq!(summary[0].count, 3);
        assert_eq!(summary[0].min, 1.0);
        assert_eq!(summary[0].median, 2.0);
        assert_eq!(summary[0].mean, 2.0);
        assert_eq!(summary[0].max, 3.0);
        assert_eq!(summary[1].size, 20);
    }

    #[test]
    fn histogram_spreads_min_to_max() {
        let h = histogram(&[0.0, 1.0, 2.0, 3.0, 4.0, 4.0], 4);
        assert_eq!(h.low, 0.0);
        assert_eq!(h.width, 1.0);
        assert_eq!(h.high(), 4.0);
        // 4.0 sits on the right edge and lands in the last bin.
        assert_eq!(h.counts, vec![1, 1, 1, 3]);
    }

    #[test]
    fn histogram_of_identical_times_is_centred() {
        let h = histogram(&[2.0, 2.0, 2.0], 30);
        assert_eq!(h.low, 1.5);
        assert_eq!(h.counts.iter().sum::<usize>(), 3);
        assert_eq!(h.counts[15], 3);
    }

    #[test]
    fn summary_carries_a_full_distribution() {
        let records: Vec<TrialRecord> = (1..=90).map(|i| rec(10, i as f64, 0)).collect();
        let summary = summarize(&records);

        let dist = &summary[0].distribution;
        assert_eq!(dist.counts.len(), HISTOGRAM_BINS);
        assert_eq!(dist.counts.iter().sum::<usize>(), 90);
        assert_eq!(dist.low, 1.0);
        assert!((dist.high() - 90.0).abs() < 1e-9);
    }

    #[test]
    fn speedup_uses_medians() {
        let sequential = [rec(100, 8.0, 0), rec(100, 8.0, 0), rec(200, 1.0, 0)];
        let parallel = [rec(100, 2.0, 4), rec(100, 100.0, 4), rec(100, 2.0, 4), rec(300, 1.0, 4)];
        let table = speedup_table(&sequential, &parallel);

        assert_eq!(table.len(), 1);
        assert_eq!(table[0].size, 100);
        assert_eq!(table[0].speedup, 4.0);
        assert_eq!(table[0].efficiency, 1.0);
    }

    #[test]
    fn discovers_only_parallel_result_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "parallel_results_2proc.csv",
            "parallel_results_16proc.csv",
            "parallel_results_proc.csv",
            "sequential_results.csv",
            "notes.txt",
        ] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }

        let names: Vec<String> = discover_parallel_files(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["parallel_results_16proc.csv", "parallel_results_2proc.csv"]);
    }

    #[test]
    fn loads_what_the_sink_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.csv");
        std::fs::write(&path, "20,0.25,0.01,0\n50,1.5,0.06,3\n").unwrap();

        let records = load_records(&path).unwrap();
        assert_eq!(
            records,
            vec![
                TrialRecord { memory_mb: 0.01, ..rec(20, 0.25, 0) },
                TrialRecord { memory_mb: 0.06, ..rec(50, 1.5, 3) },
            ]
        );
    }
}
