use std::path::Path;

use rowscatter::config::BenchConfig;
use rowscatter::driver::{self, RunSummary};
use rowscatter::{DistributedMultiplier, LocalGroup, report};

fn small_config(results_dir: &Path) -> BenchConfig {
    BenchConfig {
        sizes: vec![3, 8],
        repetitions: 2,
        results_dir: results_dir.to_path_buf(),
        ..BenchConfig::default()
    }
}

fn lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_owned)
        .collect()
}

#[test]
fn sequential_run_writes_one_line_per_trial() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path());

    let summary = driver::run_sequential(&config).unwrap();
    assert_eq!(
        summary,
        RunSummary {
            trials: 4,
            written: 4,
            dropped: 0
        }
    );

    let lines = lines(&config.sequential_path());
    assert_eq!(lines.len(), 4);
    for (line, size) in lines.iter().zip([3, 3, 8, 8]) {
        let fields: Vec<&str> = line.split(',').collect();
        assert_eq!(fields.len(), 4, "bad line {:?}", line);
        assert_eq!(fields[0], size.to_string());
        assert!(fields[1].parse::<f64>().unwrap() >= 0.0);
        assert!(fields[2].parse::<f64>().unwrap() > 0.0);
        assert_eq!(fields[3], "0");
    }
}

#[test]
fn sequential_run_appends_to_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path());

    driver::run_sequential(&config).unwrap();
    driver::run_sequential(&config).unwrap();
    assert_eq!(lines(&config.sequential_path()).len(), 8);
}

#[test]
fn distributed_run_records_at_coordinator_only() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path());

    let summaries = LocalGroup::run(3, |g| {
        let mult = DistributedMultiplier::new(g);
        driver::run_distributed(&mult, &config).unwrap()
    })
    .unwrap();

    assert_eq!(summaries[0].written, 4);
    assert!(summaries.iter().all(|s| s.trials == 4));
    assert!(summaries[1..].iter().all(|s| s.written == 0 && s.dropped == 0));

    let records = report::load_records(&config.parallel_path(3)).unwrap();
    assert_eq!(records.len(), 4);
    assert!(records.iter().all(|r| r.participants == 3));
    // 3 * 8 * 8 * 8 bytes, split over 3 participants
    let expected_mb = 3.0 * 64.0 * 8.0 / (1024.0 * 1024.0) / 3.0;
    assert!((records[3].memory_mb - expected_mb).abs() < 1e-12);
}

#[test]
fn group_of_one_records_a_sequential_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path());

    let summaries = LocalGroup::run(1, |g| {
        let mult = DistributedMultiplier::new(g);
        driver::run_group(&mult, &config).unwrap()
    })
    .unwrap();
    assert_eq!(summaries[0].written, 4);

    assert!(!config.parallel_path(1).exists());
    let records = report::load_records(&config.sequential_path()).unwrap();
    assert_eq!(records.len(), 4);
    assert!(records.iter().all(|r| r.participants == 0));
}

#[test]
fn larger_group_records_a_distributed_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path());

    LocalGroup::run(2, |g| {
        let mult = DistributedMultiplier::new(g);
        driver::run_group(&mult, &config).unwrap();
    })
    .unwrap();

    assert!(!config.sequential_path().exists());
    assert_eq!(lines(&config.parallel_path(2)).len(), 4);
}

#[test]
fn unwritable_results_are_dropped_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    // A regular file where the results directory should be.
    let blocker = dir.path().join("results");
    std::fs::write(&blocker, "").unwrap();
    let config = small_config(&blocker);

    let summary = driver::run_sequential(&config).unwrap();
    assert_eq!(summary.trials, 4);
    assert_eq!(summary.written, 0);
    assert_eq!(summary.dropped, 4);
}

#[test]
fn report_reads_back_both_result_files() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path());

    driver::run_sequential(&config).unwrap();
    LocalGroup::run(2, |g| {
        let mult = DistributedMultiplier::new(g);
        driver::run_distributed(&mult, &config).unwrap();
    })
    .unwrap();

    let sequential = report::load_records(&config.sequential_path()).unwrap();
    let files = report::discover_parallel_files(dir.path()).unwrap();
    assert_eq!(files, vec![config.parallel_path(2)]);
    let parallel = report::load_records(&files[0]).unwrap();

    let table = report::speedup_table(&sequential, &parallel);
    assert_eq!(table.len(), 2);
    assert!(table.iter().all(|row| row.participants == 2));
    assert_eq!(table[0].size, 3);
    assert_eq!(table[1].size, 8);
}
