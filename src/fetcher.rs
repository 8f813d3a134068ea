// Copyright 2025 Cowboy AI, LLC.

//! Concurrent launch of the primary and secondary lookups

use std::sync::Arc;

use tokio::time::Instant;

use crate::computation::Computation;
use crate::hooks::AggregationHooks;
use crate::model::{CustomerId, CustomerResponse, PurchaseTransactionResponse, PurchaseTransactions};
use crate::outcome::{Branch, ExecutionOutcome};
use crate::pool::WorkerPool;
use crate::sources::{CustomerSource, PurchaseTransactionSource};

/// The two computations of one call, both already running
#[derive(Debug)]
pub struct LaunchedLookups {
    /// Customer projection
    pub primary: Computation<CustomerResponse>,
    /// Transaction projections, before any recovery policy
    pub secondary: Computation<PurchaseTransactions>,
}

/// Spawns both lookups onto the worker pool without waiting for either
#[derive(Clone)]
pub struct ConcurrentFetcher {
    customers: Arc<dyn CustomerSource>,
    transactions: Arc<dyn PurchaseTransactionSource>,
    pool: WorkerPool,
    hooks: Arc<dyn AggregationHooks>,
}

impl ConcurrentFetcher {
    /// Create a fetcher over the two collaborators
    pub fn new(
        customers: Arc<dyn CustomerSource>,
        transactions: Arc<dyn PurchaseTransactionSource>,
        pool: WorkerPool,
        hooks: Arc<dyn AggregationHooks>,
    ) -> Self {
        Self {
            customers,
            transactions,
            pool,
            hooks,
        }
    }

    /// The pool both lookups run on
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Start both lookups for `key` and return immediately.
    ///
    /// Each collaborator is invoked exactly once. No retries.
    pub fn launch(&self, key: CustomerId, force_failure: bool) -> LaunchedLookups {
        let customers = self.customers.clone();
        let hooks = self.hooks.clone();
        let primary = Computation::spawn(&self.pool, Branch::Primary, async move {
            hooks.on_start(Branch::Primary, key).await;
            let started = Instant::now();

            let result = customers.find_customer(key).await.map(CustomerResponse::from);

            let outcome = ExecutionOutcome::from_result(result);
            hooks
                .on_settle(Branch::Primary, key, outcome.kind(), started.elapsed())
                .await;
            outcome.into_result(Branch::Primary)
        });

        let transactions = self.transactions.clone();
        let hooks = self.hooks.clone();
        let secondary = Computation::spawn(&self.pool, Branch::Secondary, async move {
            hooks.on_start(Branch::Secondary, key).await;
            let started = Instant::now();

            let result = transactions
                .find_transactions(key, force_failure)
                .await
                .map(|found| {
                    found
                        .into_iter()
                        .map(PurchaseTransactionResponse::from)
                        .collect::<PurchaseTransactions>()
                });

            let outcome = ExecutionOutcome::from_result(result);
            hooks
                .on_settle(Branch::Secondary, key, outcome.kind(), started.elapsed())
                .await;
            outcome.into_result(Branch::Secondary)
        });

        LaunchedLookups { primary, secondary }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AggregationError;
    use crate::hooks::{MetricsHooks, NoopHooks};
    use crate::model::{Amount, Customer, PaymentType, PurchaseTransaction};
    use crate::sources::{MockCustomerSource, MockPurchaseTransactionSource};
    use chrono::NaiveDate;
    use mockall::predicate::eq;
    use std::collections::HashSet;
    use std::time::Duration;
    use uuid::Uuid;

    fn customer(id: CustomerId) -> Customer {
        Customer {
            id,
            full_name: "Grace Hopper".to_string(),
            phone_number: "555-0199".to_string(),
            address: None,
            created_at: NaiveDate::from_ymd_opt(2019, 12, 9).unwrap(),
        }
    }

    fn transaction() -> PurchaseTransaction {
        PurchaseTransaction {
            id: Uuid::new_v4(),
            amount: Amount::from_cents(1250),
            payment_type: PaymentType::Visa,
            created_at: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_each_collaborator_invoked_once() {
        let mut customers = MockCustomerSource::new();
        customers
            .expect_find_customer()
            .with(eq(5))
            .times(1)
            .returning(|id| Ok(customer(id)));

        let mut transactions = MockPurchaseTransactionSource::new();
        transactions
            .expect_find_transactions()
            .with(eq(5), eq(false))
            .times(1)
            .returning(|_, _| Ok(HashSet::from([transaction(), transaction()])));

        let fetcher = ConcurrentFetcher::new(
            Arc::new(customers),
            Arc::new(transactions),
            WorkerPool::current().unwrap(),
            Arc::new(NoopHooks),
        );

        let launched = fetcher.launch(5, false);
        let primary = launched.primary.await.unwrap();
        let secondary = launched.secondary.await.unwrap();

        assert_eq!(primary.id, 5);
        assert!(primary.purchase_transactions.is_none());
        assert_eq!(secondary.len(), 2);
    }

    #[tokio::test]
    async fn test_force_failure_flag_reaches_collaborator() {
        let mut customers = MockCustomerSource::new();
        customers.expect_find_customer().returning(|id| Ok(customer(id)));

        let mut transactions = MockPurchaseTransactionSource::new();
        transactions
            .expect_find_transactions()
            .with(eq(2), eq(true))
            .times(1)
            .returning(|_, _| {
                Err(AggregationError::source_unavailable("purchase-transactions", "forced"))
            });

        let fetcher = ConcurrentFetcher::new(
            Arc::new(customers),
            Arc::new(transactions),
            WorkerPool::current().unwrap(),
            Arc::new(NoopHooks),
        );

        let launched = fetcher.launch(2, true);
        assert!(launched.secondary.await.unwrap_err().is_source_unavailable());
        assert!(launched.primary.await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookups_overlap() {
        use crate::sources::{DataSet, InMemoryCustomerSource, InMemoryTransactionSource};

        let mut data = DataSet::new();
        data.insert(customer(1), HashSet::from([transaction()]));
        let data = Arc::new(data);

        let hooks = Arc::new(MetricsHooks::new());
        let fetcher = ConcurrentFetcher::new(
            Arc::new(InMemoryCustomerSource::new(data.clone(), Duration::from_secs(2))),
            Arc::new(InMemoryTransactionSource::new(data, Duration::from_secs(4))),
            WorkerPool::current().unwrap(),
            hooks.clone(),
        );

        let start = Instant::now();
        let launched = fetcher.launch(1, false);
        let (primary, secondary) =
            Computation::await_all(launched.primary, launched.secondary).await;

        assert!(primary.is_ok());
        assert_eq!(secondary.unwrap().len(), 1);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(4));
        assert!(elapsed < Duration::from_secs(6));

        let metrics = hooks.metrics();
        assert_eq!(metrics.get_counter("primary.start").await, 1);
        assert_eq!(metrics.get_counter("secondary.start").await, 1);
        assert_eq!(metrics.get_counter("primary.settle.success").await, 1);
        assert_eq!(metrics.get_counter("secondary.settle.success").await, 1);
    }
}
