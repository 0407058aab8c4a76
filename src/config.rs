//! Run configuration
//!
//! Defaults cover every field, so an empty (or absent) TOML file is valid:
//!
//! ```toml
//! corpus_suffix = "_passwords.txt"
//! baseline_threshold = 50000
//! detection_threshold = 1000
//! ratio_threshold = 1000
//! lower_percentile = 5.0
//! upper_percentile = 95.0
//! outlier_floor = 0.5
//!
//! [paths]
//! corpus_dir = "OrganizedPasswords"
//! baseline = "char_distributions.json"
//! ```

use crate::error::{AnalyzerError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CORPUS_SUFFIX: &str = "_passwords.txt";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// File-name suffix that marks a corpus file.
    pub corpus_suffix: String,
    /// T1: standalone count a prefix must exceed to feed the baseline.
    pub baseline_threshold: u64,
    /// T2: standalone count a prefix must exceed to be checked for outliers.
    pub detection_threshold: u64,
    /// T3: standalone count a prefix must exceed to be ratio-classified.
    pub ratio_threshold: u64,
    pub lower_percentile: f64,
    pub upper_percentile: f64,
    /// Observed percentages at or below this are never outliers.
    pub outlier_floor: f64,
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    pub corpus_dir: PathBuf,
    pub baseline: PathBuf,
    /// Optional human-readable dump written next to the baseline.
    pub baseline_summary: Option<PathBuf>,
    pub report: PathBuf,
    pub flagged: PathBuf,
    /// Optional per-file prefix statistics from the ratio run.
    pub prefix_stats: Option<PathBuf>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            corpus_suffix: DEFAULT_CORPUS_SUFFIX.to_string(),
            baseline_threshold: 50_000,
            detection_threshold: 1_000,
            ratio_threshold: 1_000,
            lower_percentile: 5.0,
            upper_percentile: 95.0,
            outlier_floor: 0.5,
            paths: PathsConfig::default(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            corpus_dir: PathBuf::from("OrganizedPasswords"),
            baseline: PathBuf::from("char_distributions.json"),
            baseline_summary: None,
            report: PathBuf::from("suspicious_distributions.txt"),
            flagged: PathBuf::from("for_passwords_identified.json"),
            prefix_stats: None,
        }
    }
}

impl AnalyzerConfig {
    /// Load from a TOML file, or defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(p) => {
                let content = std::fs::read_to_string(p).map_err(|e| {
                    AnalyzerError::Config(format!("cannot read {}: {e}", p.display()))
                })?;
                Self::from_toml(&content)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| AnalyzerError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        let in_range = |p: f64| (0.0..=100.0).contains(&p);
        if !in_range(self.lower_percentile) || !in_range(self.upper_percentile) {
            return Err(AnalyzerError::Config(
                "percentiles must be within [0, 100]".to_string(),
            ));
        }
        if self.lower_percentile > self.upper_percentile {
            return Err(AnalyzerError::Config(format!(
                "lower percentile {} exceeds upper percentile {}",
                self.lower_percentile, self.upper_percentile
            )));
        }
        if self.outlier_floor.is_nan() || self.outlier_floor < 0.0 {
            return Err(AnalyzerError::Config("outlier_floor must be >= 0".to_string()));
        }
        if self.corpus_suffix.is_empty() {
            return Err(AnalyzerError::Config("corpus_suffix must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = AnalyzerConfig::from_toml("").unwrap();
        assert_eq!(config, AnalyzerConfig::default());
        assert_eq!(config.baseline_threshold, 50_000);
        assert_eq!(config.outlier_floor, 0.5);
    }

    #[test]
    fn partial_toml_overrides_fields() {
        let config = AnalyzerConfig::from_toml(
            "detection_threshold = 10\n[paths]\nbaseline = \"base.bin\"\n",
        )
        .unwrap();
        assert_eq!(config.detection_threshold, 10);
        assert_eq!(config.paths.baseline, PathBuf::from("base.bin"));
        assert_eq!(config.ratio_threshold, 1_000);
        assert_eq!(config.paths.report, PathBuf::from("suspicious_distributions.txt"));
    }

    #[test]
    fn rejects_inverted_percentiles() {
        let config = AnalyzerConfig {
            lower_percentile: 90.0,
            upper_percentile: 10.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_and_nan() {
        let mut config = AnalyzerConfig { upper_percentile: 101.0, ..Default::default() };
        assert!(config.validate().is_err());
        config.upper_percentile = 95.0;
        config.outlier_floor = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_toml_is_a_config_error() {
        let err = AnalyzerConfig::from_toml("baseline_threshold = \"lots\"").unwrap_err();
        assert!(matches!(err, AnalyzerError::Config(_)));
    }
}
