// Copyright 2025 Cowboy AI, LLC.

//! Barrier join of the primary and policy-wrapped secondary computations

use std::sync::Arc;

use tracing::debug;

use crate::computation::Computation;
use crate::errors::{AggregationError, AggregationResult};
use crate::hooks::AggregationHooks;
use crate::model::{CustomerId, CustomerResponse, PurchaseTransactions};
use crate::outcome::ComputationState;

/// Joins both branches into one [`CustomerResponse`]
#[derive(Clone)]
pub struct Combiner {
    hooks: Arc<dyn AggregationHooks>,
}

impl Combiner {
    /// Create a combiner reporting to `hooks`
    pub fn new(hooks: Arc<dyn AggregationHooks>) -> Self {
        Self { hooks }
    }

    /// Wait for both computations and merge them.
    ///
    /// Both sides always settle before this returns, even if one failed early.
    /// Any error surfaces as a single `AggregationFailure`, and the other
    /// side's value is dropped rather than returned partially.
    pub async fn join(
        &self,
        key: CustomerId,
        primary: Computation<CustomerResponse>,
        secondary: Computation<PurchaseTransactions>,
    ) -> AggregationResult<CustomerResponse> {
        let (primary, secondary) = Computation::await_all(primary, secondary).await;

        debug!(
            key,
            primary = %ComputationState::resolved(&primary),
            secondary = %ComputationState::resolved(&secondary),
            "Branches settled"
        );

        let combined = match (primary, secondary) {
            (Ok(customer), Ok(transactions)) => Ok(customer.with_purchase_transactions(transactions)),
            (Err(err), _) | (Ok(_), Err(err)) => Err(AggregationError::aggregation_failure(err)),
        };

        self.hooks.on_join(key, combined.as_ref().err()).await;
        combined
    }
}
