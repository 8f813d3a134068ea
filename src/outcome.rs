// Copyright 2025 Cowboy AI, LLC.

//! Settled outcomes and the per-branch state machine
//!
//! Every secondary computation moves through a small, closed set of states:
//!
//! ```text
//! Pending ──► Succeeded ─┐
//!    │                   ├──► Resolved(value)
//!    ├──────► Failed ────┤
//!    │                   └──► Resolved(error)
//!    └──────► TimedOut ──┘
//! ```
//!
//! The race between the lookup and its deadline decides the middle state;
//! the recovery policy decides which `Resolved` variant is terminal.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{AggregationError, AggregationResult};

/// Which side of the aggregation a computation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Branch {
    /// The customer lookup
    Primary,
    /// The purchase transaction lookup
    Secondary,
}

impl Branch {
    /// Name used in logs and metric keys
    pub fn name(&self) -> &'static str {
        match self {
            Branch::Primary => "primary",
            Branch::Secondary => "secondary",
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a computation settled before any policy was applied
#[derive(Debug, Clone)]
pub enum ExecutionOutcome<T> {
    /// The lookup produced a value
    Success(T),
    /// The lookup failed
    Failure(AggregationError),
    /// The deadline elapsed first
    TimedOut(Duration),
}

impl<T> ExecutionOutcome<T> {
    /// Classify a finished lookup
    pub fn from_result(result: AggregationResult<T>) -> Self {
        match result {
            Ok(value) => ExecutionOutcome::Success(value),
            Err(AggregationError::Timeout { after, .. }) => ExecutionOutcome::TimedOut(after),
            Err(err) => ExecutionOutcome::Failure(err),
        }
    }

    /// The state this outcome leaves a computation in
    pub fn state(&self) -> ComputationState {
        match self {
            ExecutionOutcome::Success(_) => ComputationState::Succeeded,
            ExecutionOutcome::Failure(_) => ComputationState::Failed,
            ExecutionOutcome::TimedOut(_) => ComputationState::TimedOut,
        }
    }

    /// Whether the lookup produced a value
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success(_))
    }

    /// Borrowed view without the payload
    pub fn kind(&self) -> OutcomeKind {
        match self {
            ExecutionOutcome::Success(_) => OutcomeKind::Success,
            ExecutionOutcome::Failure(_) => OutcomeKind::Failure,
            ExecutionOutcome::TimedOut(_) => OutcomeKind::TimedOut,
        }
    }

    /// Convert back into a result, timing out on `branch`
    pub fn into_result(self, branch: Branch) -> AggregationResult<T> {
        match self {
            ExecutionOutcome::Success(value) => Ok(value),
            ExecutionOutcome::Failure(err) => Err(err),
            ExecutionOutcome::TimedOut(after) => Err(AggregationError::Timeout { branch, after }),
        }
    }
}

/// Payload-free tag of an [`ExecutionOutcome`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    /// Settled with a value
    Success,
    /// Settled with an error
    Failure,
    /// Lost the race against its deadline
    TimedOut,
}

impl OutcomeKind {
    /// Classify a result without consuming it
    pub fn of<T>(result: &AggregationResult<T>) -> Self {
        match result {
            Ok(_) => OutcomeKind::Success,
            Err(AggregationError::Timeout { .. }) => OutcomeKind::TimedOut,
            Err(_) => OutcomeKind::Failure,
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutcomeKind::Success => "success",
            OutcomeKind::Failure => "failure",
            OutcomeKind::TimedOut => "timed_out",
        };
        f.write_str(name)
    }
}

/// Lifecycle states of a secondary computation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComputationState {
    /// Launched, not yet settled
    Pending,
    /// Lookup produced a value
    Succeeded,
    /// Lookup failed
    Failed,
    /// Deadline elapsed before the lookup settled
    TimedOut,
    /// Policy produced the value handed to the join
    ResolvedValue,
    /// Policy let an error through to the join
    ResolvedError,
}

impl ComputationState {
    /// Get the name of this state for logging
    pub fn name(&self) -> &'static str {
        match self {
            ComputationState::Pending => "Pending",
            ComputationState::Succeeded => "Succeeded",
            ComputationState::Failed => "Failed",
            ComputationState::TimedOut => "TimedOut",
            ComputationState::ResolvedValue => "Resolved(value)",
            ComputationState::ResolvedError => "Resolved(error)",
        }
    }

    /// Terminal state for what a policy handed to the join
    pub fn resolved<T>(result: &AggregationResult<T>) -> Self {
        if result.is_ok() {
            ComputationState::ResolvedValue
        } else {
            ComputationState::ResolvedError
        }
    }

    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ComputationState::ResolvedValue | ComputationState::ResolvedError
        )
    }

    /// Check whether moving to `target` is a legal transition
    pub fn can_transition_to(&self, target: &ComputationState) -> bool {
        use ComputationState::*;

        matches!(
            (self, target),
            (Pending, Succeeded)
                | (Pending, Failed)
                | (Pending, TimedOut)
                | (Succeeded, ResolvedValue)
                | (Succeeded, ResolvedError)
                | (Failed, ResolvedValue)
                | (Failed, ResolvedError)
                | (TimedOut, ResolvedValue)
                | (TimedOut, ResolvedError)
        )
    }

    /// All states reachable in one step
    pub fn valid_transitions(&self) -> Vec<ComputationState> {
        use ComputationState::*;

        [Pending, Succeeded, Failed, TimedOut, ResolvedValue, ResolvedError]
            .into_iter()
            .filter(|target| self.can_transition_to(target))
            .collect()
    }
}

impl fmt::Display for ComputationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_classification() {
        let ok: ExecutionOutcome<u8> = ExecutionOutcome::from_result(Ok(1));
        assert_eq!(ok.state(), ComputationState::Succeeded);
        assert!(ok.is_success());

        let failed: ExecutionOutcome<u8> = ExecutionOutcome::from_result(Err(
            AggregationError::source_unavailable("purchase-transactions", "down"),
        ));
        assert_eq!(failed.kind(), OutcomeKind::Failure);

        let timed_out: ExecutionOutcome<u8> =
            ExecutionOutcome::from_result(Err(AggregationError::Timeout {
                branch: Branch::Secondary,
                after: Duration::from_secs(2),
            }));
        assert_eq!(timed_out.state(), ComputationState::TimedOut);
        assert!(timed_out.into_result(Branch::Secondary).unwrap_err().is_timeout());
    }

    #[test]
    fn test_pending_only_settles() {
        let targets = ComputationState::Pending.valid_transitions();
        assert_eq!(
            targets,
            vec![
                ComputationState::Succeeded,
                ComputationState::Failed,
                ComputationState::TimedOut
            ]
        );
        assert!(!ComputationState::Pending.can_transition_to(&ComputationState::ResolvedValue));
    }

    #[test]
    fn test_resolved_states_are_terminal() {
        for state in [ComputationState::ResolvedValue, ComputationState::ResolvedError] {
            assert!(state.is_terminal());
            assert!(state.valid_transitions().is_empty());
        }
        assert!(!ComputationState::TimedOut.is_terminal());
        assert!(ComputationState::TimedOut.can_transition_to(&ComputationState::ResolvedValue));
    }
}
