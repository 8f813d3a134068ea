// Copyright 2025 Cowboy AI, LLC.

//! Error types for aggregation operations

use std::time::Duration;

use thiserror::Error;

use crate::outcome::Branch;

/// Errors that can occur while composing an aggregated result
#[derive(Debug, Clone, Error)]
pub enum AggregationError {
    /// A collaborator was invoked with forced failure or genuinely failed
    #[error("Source unavailable: {source_name} - {reason}")]
    SourceUnavailable {
        /// Name of the collaborator that failed
        source_name: String,
        /// Why it failed
        reason: String,
    },

    /// A branch exceeded its policy-selected deadline
    #[error("Timeout: {branch} lookup did not settle within {after:?}")]
    Timeout {
        /// Branch that timed out
        branch: Branch,
        /// Deadline that elapsed
        after: Duration,
    },

    /// An unrecovered error reached the barrier join
    #[error("Aggregation failure: {cause}")]
    AggregationFailure {
        /// The unrecovered error
        #[source]
        cause: Box<AggregationError>,
    },

    /// The primary collaborator has no entity for the key
    #[error("Customer not found: {0}")]
    CustomerNotFound(i64),

    /// A spawned branch panicked or was torn down with its runtime
    #[error("Task failed: {0}")]
    TaskFailed(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type for aggregation operations
pub type AggregationResult<T> = Result<T, AggregationError>;

impl AggregationError {
    /// Create a source-unavailable error
    pub fn source_unavailable(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        AggregationError::SourceUnavailable {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// Wrap an error as the overall call's failure.
    ///
    /// Already-wrapped errors are returned unchanged so the join never nests
    /// more than one `AggregationFailure` layer.
    pub fn aggregation_failure(cause: AggregationError) -> Self {
        match cause {
            failure @ AggregationError::AggregationFailure { .. } => failure,
            other => AggregationError::AggregationFailure {
                cause: Box::new(other),
            },
        }
    }

    /// The innermost error below any `AggregationFailure` layers
    pub fn root_cause(&self) -> &AggregationError {
        let mut current = self;
        while let AggregationError::AggregationFailure { cause } = current {
            current = cause;
        }
        current
    }

    /// Check if this error (or its root cause) is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self.root_cause(), AggregationError::Timeout { .. })
    }

    /// Check if this error (or its root cause) is an unavailable source
    pub fn is_source_unavailable(&self) -> bool {
        matches!(self.root_cause(), AggregationError::SourceUnavailable { .. })
    }

    /// Check if this error surfaced from the barrier join
    pub fn is_aggregation_failure(&self) -> bool {
        matches!(self, AggregationError::AggregationFailure { .. })
    }
}

impl From<tokio::task::JoinError> for AggregationError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_panic() {
            AggregationError::TaskFailed(format!("lookup panicked: {err}"))
        } else {
            AggregationError::TaskFailed(format!("lookup cancelled: {err}"))
        }
    }
}

impl From<crate::config::ConfigError> for AggregationError {
    fn from(err: crate::config::ConfigError) -> Self {
        AggregationError::Configuration(err.to_string())
    }
}
