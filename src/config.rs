//! Benchmark configuration, read from TOML.
//!
//! Every field has a default, so an empty file (or no file) runs the
//! standard experiment:
//!
//! ```toml
//! sizes = [20, 50, 100, 200, 500, 700]
//! repetitions = 1000
//! results_dir = "results"
//! kernel = "ikj"
//! ```
//!
//! The number of participants is not configured here: it comes from `-n`
//! for in-process runs and from the MPI launcher otherwise.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::matrix::Kernel;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level benchmark configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BenchConfig {
    /// Square matrix sizes to benchmark, in order.
    #[serde(default = "default_sizes")]
    pub sizes: Vec<usize>,
    /// Trials per size.
    #[serde(default = "default_repetitions")]
    pub repetitions: usize,
    /// Directory the CSV result files are appended to.
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
    #[serde(default)]
    pub kernel: Kernel,
}

fn default_sizes() -> Vec<usize> {
    vec![20, 50, 100, 200, 500, 700]
}
fn default_repetitions() -> usize {
    1000
}
fn default_results_dir() -> PathBuf {
    PathBuf::from("results")
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            sizes: default_sizes(),
            repetitions: default_repetitions(),
            results_dir: default_results_dir(),
            kernel: Kernel::default(),
        }
    }
}

impl BenchConfig {
    /// Load and validate a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: BenchConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sizes.is_empty() {
            return Err(ConfigError::Invalid("sizes must not be empty".into()));
        }
        if let Some(bad) = self.sizes.iter().find(|&&s| s == 0) {
            return Err(ConfigError::Invalid(format!("matrix size {} is not positive", bad)));
        }
        if self.repetitions == 0 {
            return Err(ConfigError::Invalid("repetitions must be at least 1".into()));
        }
        Ok(())
    }

    /// Result file for single-participant runs.
    pub fn sequential_path(&self) -> PathBuf {
        self.results_dir.join("sequential_results.csv")
    }

    /// Result file for runs over `participants` participants.
    pub fn parallel_path(&self, participants: usize) -> PathBuf {
        self.results_dir
            .join(format!("parallel_results_{}proc.csv", participants))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = BenchConfig::from_toml_str("").unwrap();
        assert_eq!(config, BenchConfig::default());
        assert_eq!(config.sizes, vec![20, 50, 100, 200, 500, 700]);
        assert_eq!(config.repetitions, 1000);
    }

    #[test]
    fn parses_all_fields() {
        let config = BenchConfig::from_toml_str(
            r#"
            sizes = [8, 16]
            repetitions = 3
            results_dir = "out"
            kernel = "ijk"
            "#,
        )
        .unwrap();

        assert_eq!(config.sizes, vec![8, 16]);
        assert_eq!(config.repetitions, 3);
        assert_eq!(config.kernel, Kernel::Ijk);
        assert_eq!(config.parallel_path(4), PathBuf::from("out/parallel_results_4proc.csv"));
        assert_eq!(config.sequential_path(), PathBuf::from("out/sequential_results.csv"));
    }

    #[test]
    fn rejects_zero_size() {
        let err = BenchConfig::from_toml_str("sizes = [10, 0]").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_zero_repetitions() {
        assert!(BenchConfig::from_toml_str("repetitions = 0").is_err());
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(matches!(
            BenchConfig::from_toml_str("[transport]\nbind = \"127.0.0.1:0\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            BenchConfig::from_toml_str("size = [10]"),
            Err(ConfigError::Parse(_))
        ));
    }
}
