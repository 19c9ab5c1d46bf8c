// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Simulation-wide configuration consumed by every aggregator.
//!
//! The year range and replicate count are fixed for the lifetime of an
//! aggregator, so they are handed to its constructor explicitly rather
//! than read from process-wide state.

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

/// Default number of values held by one event-log bucket.
pub const DEFAULT_BUCKET_CAPACITY: usize = 10_000;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("empty year range: last year {last} precedes first year {first}")]
    EmptyYearRange { first: i32, last: i32 },

    #[error("replicate count must be at least 1")]
    NoReplicates,

    #[error("event bucket capacity must be at least 1")]
    ZeroBucketCapacity,

    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// SimulationConfig
// ---------------------------------------------------------------------------

/// Year range, replicate count and output location of one simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// First simulated year (inclusive).
    pub first_year: i32,
    /// Last simulated year (inclusive).
    pub last_year: i32,
    /// Number of replicates; valid rep indices are `0..max_reps`.
    pub max_reps: usize,
    /// Directory that report files are written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_bucket_capacity")]
    pub bucket_capacity: usize,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_bucket_capacity() -> usize {
    DEFAULT_BUCKET_CAPACITY
}

impl SimulationConfig {
    /// Build and validate a configuration writing to the current directory.
    pub fn new(first_year: i32, last_year: i32, max_reps: usize) -> Result<Self, ConfigError> {
        let config = Self {
            first_year,
            last_year,
            max_reps,
            output_dir: default_output_dir(),
            bucket_capacity: DEFAULT_BUCKET_CAPACITY,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_bucket_capacity(mut self, capacity: usize) -> Result<Self, ConfigError> {
        self.bucket_capacity = capacity;
        self.validate()?;
        Ok(self)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.last_year < self.first_year {
            return Err(ConfigError::EmptyYearRange {
                first: self.first_year,
                last: self.last_year,
            });
        }
        if self.max_reps == 0 {
            return Err(ConfigError::NoReplicates);
        }
        if self.bucket_capacity == 0 {
            return Err(ConfigError::ZeroBucketCapacity);
        }
        Ok(())
    }

    /// Number of years in the closed interval `first_year..=last_year`.
    pub fn num_years(&self) -> usize {
        (i64::from(self.last_year) - i64::from(self.first_year) + 1).max(0) as usize
    }

    pub fn years(&self) -> RangeInclusive<i32> {
        self.first_year..=self.last_year
    }

    /// Zero-based slot of `year`, or `None` when outside the range.
    pub fn year_index(&self, year: i32) -> Option<usize> {
        if self.years().contains(&year) {
            Some((i64::from(year) - i64::from(self.first_year)) as usize)
        } else {
            None
        }
    }

    pub fn contains_rep(&self, rep: usize) -> bool {
        rep < self.max_reps
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_range_is_closed() {
        let config = SimulationConfig::new(2000, 2001, 2).unwrap();
        assert_eq!(config.num_years(), 2);
        assert_eq!(config.year_index(2000), Some(0));
        assert_eq!(config.year_index(2001), Some(1));
        assert_eq!(config.year_index(1999), None);
        assert_eq!(config.year_index(2002), None);
    }

    #[test]
    fn single_year_range() {
        let config = SimulationConfig::new(5, 5, 1).unwrap();
        assert_eq!(config.num_years(), 1);
        assert_eq!(config.years().collect::<Vec<_>>(), vec![5]);
    }

    #[test]
    fn rejects_inverted_years() {
        let err = SimulationConfig::new(2001, 2000, 2).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyYearRange { first: 2001, last: 2000 }));
    }

    #[test]
    fn rejects_zero_reps_and_zero_capacity() {
        assert!(matches!(
            SimulationConfig::new(0, 10, 0),
            Err(ConfigError::NoReplicates)
        ));
        let config = SimulationConfig::new(0, 10, 1).unwrap();
        assert!(matches!(
            config.with_bucket_capacity(0),
            Err(ConfigError::ZeroBucketCapacity)
        ));
    }

    #[test]
    fn json_defaults_apply() {
        let config =
            SimulationConfig::from_json_str(r#"{"first_year": 1950, "last_year": 2000, "max_reps": 10}"#)
                .unwrap();
        assert_eq!(config.bucket_capacity, DEFAULT_BUCKET_CAPACITY);
        assert_eq!(config.output_dir, PathBuf::from("."));
        assert_eq!(config.num_years(), 51);
    }

    #[test]
    fn json_is_validated() {
        let err = SimulationConfig::from_json_str(
            r#"{"first_year": 1950, "last_year": 2000, "max_reps": 0}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::NoReplicates));

        let err = SimulationConfig::from_json_str("{").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = SimulationConfig::load(Path::new("/nonexistent/run.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn extreme_years_do_not_overflow() {
        let config = SimulationConfig::new(i32::MIN, i32::MIN + 3, 1).unwrap();
        assert_eq!(config.num_years(), 4);
        assert_eq!(config.year_index(i32::MIN + 3), Some(3));
    }
}
