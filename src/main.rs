//! Benchmark runner: sequential vs distributed matrix multiplication.
//!
//! ```sh
//! rowscatter run                               # sequential, default experiment
//! rowscatter run -n 4                          # 4 threads in this process
//! mpirun -n 4 rowscatter run --transport mpi   # 4 MPI processes
//! rowscatter report
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};

use rowscatter::config::BenchConfig;
use rowscatter::driver::{self, RunSummary};
#[cfg(feature = "mpi")]
use rowscatter::group::MpiGroup;
use rowscatter::group::{Group, LocalGroup};
use rowscatter::matrix::Kernel;
use rowscatter::report;
use rowscatter::DistributedMultiplier;

#[derive(Parser)]
#[command(name = "rowscatter")]
#[command(about = "Row-block distributed matrix multiplication benchmark")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the benchmark and append results to CSV files.
    Run(RunArgs),
    /// Summarise recorded results: per-size timings, speedup and efficiency.
    Report {
        /// Directory holding the result files.
        #[arg(long, default_value = "results")]
        results_dir: PathBuf,
    },
    /// Validate a configuration file without running anything.
    Validate {
        config: PathBuf,
    },
}

#[derive(clap::Args)]
struct RunArgs {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Number of in-process participants, coordinator included. 1 runs
    /// sequentially. Ignored under MPI, where the launcher decides.
    #[arg(short = 'n', long, default_value_t = 1)]
    processes: usize,
    #[arg(long, value_enum, default_value_t = Transport::Local)]
    transport: Transport,
    /// Matrix sizes, comma separated (overrides the config file).
    #[arg(long, value_delimiter = ',')]
    sizes: Option<Vec<usize>>,
    /// Trials per size (overrides the config file).
    #[arg(long)]
    repetitions: Option<usize>,
    /// Output directory (overrides the config file).
    #[arg(long)]
    results_dir: Option<PathBuf>,
    #[arg(long, value_enum)]
    kernel: Option<Kernel>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Transport {
    /// One thread per participant.
    Local,
    /// One MPI process per participant (needs the `mpi` feature).
    Mpi,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Report { results_dir } => print_report(&results_dir),
        Commands::Validate { config } => {
            BenchConfig::load(&config)
                .with_context(|| format!("validating {}", config.display()))?;
            println!("Configuration is valid: {}", config.display());
            Ok(())
        }
    }
}

fn load_config(args: &RunArgs) -> Result<BenchConfig> {
    let mut config = match &args.config {
        Some(path) => BenchConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => BenchConfig::default(),
    };
    if let Some(sizes) = &args.sizes {
        config.sizes = sizes.clone();
    }
    if let Some(repetitions) = args.repetitions {
        config.repetitions = repetitions;
    }
    if let Some(dir) = &args.results_dir {
        config.results_dir = dir.clone();
    }
    if let Some(kernel) = args.kernel {
        config.kernel = kernel;
    }
    config.validate()?;
    Ok(config)
}

fn run(args: RunArgs) -> Result<()> {
    let config = load_config(&args)?;

    match args.transport {
        Transport::Local => {
            if args.processes == 0 {
                bail!("--processes must be at least 1");
            }
            let outcomes = LocalGroup::run(args.processes, |group| run_participant(group, &config))?;
            for outcome in outcomes {
                let summary = outcome?;
                if summary.written + summary.dropped > 0 {
                    report_summary(&summary);
                }
            }
            Ok(())
        }
        Transport::Mpi => run_mpi(&config),
    }
}

/// One rank of an `mpirun` job. The group size comes from the launcher.
#[cfg(feature = "mpi")]
fn run_mpi(config: &BenchConfig) -> Result<()> {
    let group = MpiGroup::init()?;
    let coordinator = group.is_coordinator();
    let summary = run_participant(group, config)?;
    if coordinator {
        report_summary(&summary);
    }
    Ok(())
}

#[cfg(not(feature = "mpi"))]
fn run_mpi(_config: &BenchConfig) -> Result<()> {
    bail!("built without MPI support; rebuild with `--features mpi` and start under mpirun")
}

fn run_participant<G: Group>(group: G, config: &BenchConfig) -> Result<RunSummary> {
    let rank = group.rank();
    let multiplier = DistributedMultiplier::with_kernel(group, config.kernel);
    let summary = driver::run_group(&multiplier, config)
        .with_context(|| format!("participant {}", rank))?;
    multiplier
        .finalize()
        .with_context(|| format!("participant {} teardown", rank))?;
    Ok(summary)
}

fn report_summary(summary: &RunSummary) {
    log::info!(
        "{} trials, {} results written, {} dropped",
        summary.trials,
        summary.written,
        summary.dropped
    );
}

fn print_report(results_dir: &std::path::Path) -> Result<()> {
    let sequential_path = results_dir.join("sequential_results.csv");
    let sequential = if sequential_path.exists() {
        report::load_records(&sequential_path)?
    } else {
        log::warn!("{} does not exist", sequential_path.display());
        Vec::new()
    };

    let mut parallel = Vec::new();
    for path in report::discover_parallel_files(results_dir)? {
        parallel.extend(report::load_records(&path)?);
    }

    println!("{}", "=".repeat(78));
    println!("EXECUTION TIME (seconds)");
    println!("{}", "=".repeat(78));
    println!(
        "{:<12} {:>6} {:>7} {:>12} {:>12} {:>12} {:>12}",
        "Version", "Size", "Trials", "Min", "Median", "Mean", "Max"
    );
    println!("{}", "-".repeat(78));
    let summaries: Vec<_> = report::summarize(&sequential)
        .into_iter()
        .chain(report::summarize(&parallel))
        .collect();
    for row in &summaries {
        println!(
            "{:<12} {:>6} {:>7} {:>12.6} {:>12.6} {:>12.6} {:>12.6}",
            version_label(row.participants),
            row.size,
            row.count,
            row.min,
            row.median,
            row.mean,
            row.max
        );
    }

    println!("\n{}", "=".repeat(78));
    println!("TIME DISTRIBUTION ({} bins, ms)", report::HISTOGRAM_BINS);
    println!("{}", "=".repeat(78));
    for row in &summaries {
        let dist = &row.distribution;
        let counts: Vec<String> = dist.counts.iter().map(usize::to_string).collect();
        println!(
            "{:<12} {:>6}  [{:.3} .. {:.3}]  {}",
            version_label(row.participants),
            row.size,
            dist.low * 1000.0,
            dist.high() * 1000.0,
            counts.join(" ")
        );
    }

    let table = report::speedup_table(&sequential, &parallel);
    if table.is_empty() {
        println!("\nNo sizes recorded both sequentially and in parallel.");
        return Ok(());
    }

    println!("\n{}", "=".repeat(78));
    println!("SPEEDUP");
    println!("{}", "=".repeat(78));
    println!(
        "{:<8} {:>6} {:>14} {:>14} {:>10} {:>11}",
        "Procs", "Size", "Seq median", "Par median", "Speedup", "Efficiency"
    );
    println!("{}", "-".repeat(78));
    for row in &table {
        println!(
            "{:<8} {:>6} {:>14.6} {:>14.6} {:>9.2}× {:>10.1}%",
            row.participants,
            row.size,
            row.sequential_median,
            row.parallel_median,
            row.speedup,
            row.efficiency * 100.0
        );
    }
    println!("\nSpeedup = sequential median / parallel median. Efficiency = speedup / processes.\n");
    Ok(())
}

fn version_label(participants: usize) -> String {
    if participants == 0 {
        "sequential".to_string()
    } else {
        format!("{} procs", participants)
    }
}
