// Copyright 2025 Cowboy AI, LLC.

//! Recovery policies applied to the secondary computation
//!
//! The applier turns the raw secondary computation into the one handed to the
//! barrier join. Policies never touch the primary branch.
//!
//! | Policy                        | Hook                | Failure / timeout becomes |
//! |-------------------------------|---------------------|---------------------------|
//! | `PropagateEmptyOnError`       | `recover`           | empty set                 |
//! | `SwallowErrorUnconditionally` | `handle`            | empty set                 |
//! | `ObserveOnly`                 | `observe`           | unchanged failure         |
//! | `FailOnTimeout`               | deadline            | `Timeout` failure         |
//! | `DefaultOnTimeout`            | deadline            | empty set                 |

use std::sync::Arc;

use crate::computation::Computation;
use crate::errors::AggregationError;
use crate::hooks::AggregationHooks;
use crate::model::{CustomerId, PurchaseTransactions};
use crate::outcome::{Branch, OutcomeKind};
use crate::policy::{PolicySelection, RecoveryPolicy};

/// Wraps the secondary computation with exactly one recovery policy
#[derive(Clone)]
pub struct PolicyApplier {
    hooks: Arc<dyn AggregationHooks>,
}

impl PolicyApplier {
    /// Create an applier reporting to `hooks`
    pub fn new(hooks: Arc<dyn AggregationHooks>) -> Self {
        Self { hooks }
    }

    /// Apply `policy` to `secondary`.
    ///
    /// Only the deadline of `selection` is used, and only by the timeout
    /// policies; forced failure has already been passed to the fetcher.
    pub fn apply(
        &self,
        policy: RecoveryPolicy,
        selection: PolicySelection,
        key: CustomerId,
        secondary: Computation<PurchaseTransactions>,
    ) -> Computation<PurchaseTransactions> {
        let hooks = self.hooks.clone();
        let branch = secondary.branch();

        match policy {
            RecoveryPolicy::PropagateEmptyOnError => secondary.recover(move |err| async move {
                hooks.on_recover(branch, key, &err).await;
                Ok(PurchaseTransactions::new())
            }),

            RecoveryPolicy::SwallowErrorUnconditionally => {
                secondary.handle(move |result| async move {
                    hooks.on_observe(branch, key, OutcomeKind::of(&result)).await;

                    match result {
                        Ok(transactions) => Ok(transactions),
                        Err(err) => {
                            hooks.on_recover(branch, key, &err).await;
                            Ok(PurchaseTransactions::new())
                        }
                    }
                })
            }

            RecoveryPolicy::ObserveOnly => secondary.observe(move |kind| async move {
                hooks.on_observe(branch, key, kind).await;
            }),

            RecoveryPolicy::FailOnTimeout => {
                secondary.with_deadline_or_else(selection.timeout, move |after| async move {
                    hooks.on_timeout(branch, key, after).await;
                    Err(AggregationError::Timeout { branch, after })
                })
            }

            RecoveryPolicy::DefaultOnTimeout => {
                secondary.with_deadline_or_else(selection.timeout, move |after| async move {
                    hooks.on_timeout(branch, key, after).await;
                    hooks
                        .on_recover(
                            branch,
                            key,
                            &AggregationError::Timeout { branch, after },
                        )
                        .await;
                    Ok(PurchaseTransactions::new())
                })
            }
        }
    }

    /// Apply a caller-supplied unconditional handler instead of a named policy.
    ///
    /// The handler sees every outcome and may substitute a value or rethrow a
    /// different error, which then reaches the join unrecovered.
    pub fn apply_handler<F, Fut>(
        &self,
        secondary: Computation<PurchaseTransactions>,
        handler: F,
    ) -> Computation<PurchaseTransactions>
    where
        F: FnOnce(Result<PurchaseTransactions, AggregationError>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<PurchaseTransactions, AggregationError>>
            + Send
            + 'static,
    {
        debug_assert_eq!(secondary.branch(), Branch::Secondary);
        secondary.handle(handler)
    }
}
