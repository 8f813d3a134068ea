// Copyright 2025 Cowboy AI, LLC.

//! Configuration for the aggregation service
//!
//! Loaded from TOML. Every section is optional; missing values fall back to
//! the defaults below.
//!
//! ```toml
//! [pool]
//! size = 8            # omitted: host available parallelism
//!
//! [latency]
//! primary_ms = 2000
//! secondary_ms = 4000
//!
//! [deadlines]
//! even_secs = 2
//! odd_secs = 5
//!
//! [dataset]
//! customers = 9
//! max_transactions = 10
//! seed = 42           # omitted: random data every run
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::policy::DeadlinePolicySelector;
use crate::pool::available_parallelism;

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Failed to read config {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The TOML could not be parsed
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be rendered
    #[error("Failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    /// A value is out of range
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Worker pool sizing
    pub pool: PoolConfig,
    /// Simulated collaborator latency
    pub latency: LatencyConfig,
    /// Deadlines for the timeout policies
    pub deadlines: DeadlineConfig,
    /// Generated collaborator data
    pub dataset: DatasetConfig,
}

/// Worker pool sizing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Worker threads; host parallelism when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
}

/// Simulated latency of the in-memory collaborators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencyConfig {
    /// Customer lookup latency in milliseconds
    pub primary_ms: u64,
    /// Transaction lookup latency in milliseconds
    pub secondary_ms: u64,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            primary_ms: 2_000,
            secondary_ms: 4_000,
        }
    }
}

/// Deadlines selected by key parity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeadlineConfig {
    /// Deadline for even keys, in seconds
    pub even_secs: u64,
    /// Deadline for odd keys, in seconds
    pub odd_secs: u64,
}

impl Default for DeadlineConfig {
    fn default() -> Self {
        Self {
            even_secs: DeadlinePolicySelector::DEFAULT_EVEN_SECS,
            odd_secs: DeadlinePolicySelector::DEFAULT_ODD_SECS,
        }
    }
}

/// Shape of the generated data set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Customers with ids `1..=customers`
    pub customers: usize,
    /// Upper bound of transactions per customer
    pub max_transactions: usize,
    /// RNG seed for reproducible data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            customers: 9,
            max_transactions: 10,
            seed: None,
        }
    }
}

impl AggregationConfig {
    /// Parse and validate TOML
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool.size == Some(0) {
            return Err(ConfigError::Invalid("pool.size must be at least 1".to_string()));
        }
        if self.deadlines.even_secs == 0 || self.deadlines.odd_secs == 0 {
            return Err(ConfigError::Invalid(
                "deadlines must be at least one second".to_string(),
            ));
        }
        if self.dataset.max_transactions == 0 {
            return Err(ConfigError::Invalid(
                "dataset.max_transactions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Worker count, resolving an unset size to host parallelism
    pub fn pool_size(&self) -> usize {
        self.pool.size.unwrap_or_else(available_parallelism)
    }

    /// Selector using the configured deadlines
    pub fn selector(&self) -> DeadlinePolicySelector {
        DeadlinePolicySelector::new(
            Duration::from_secs(self.deadlines.even_secs),
            Duration::from_secs(self.deadlines.odd_secs),
        )
    }

    /// Customer lookup latency
    pub fn primary_latency(&self) -> Duration {
        Duration::from_millis(self.latency.primary_ms)
    }

    /// Transaction lookup latency
    pub fn secondary_latency(&self) -> Duration {
        Duration::from_millis(self.latency.secondary_ms)
    }
}
