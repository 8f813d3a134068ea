// Copyright 2025 Cowboy AI, LLC.

//! Customer aggregation service
//!
//! One call launches the customer and transaction lookups concurrently,
//! wraps the transaction branch in a recovery policy and joins both sides
//! into a [`CustomerResponse`].
//!
//! ```rust,no_run
//! use cim_aggregation::{AggregationConfig, CustomerAggregationService};
//!
//! let service = CustomerAggregationService::from_config(&AggregationConfig::default())?;
//! let customer = service.get_blocking(1, "using-exceptionally".parse()?)?;
//! println!("{}", serde_json::to_string_pretty(&customer)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::applier::PolicyApplier;
use crate::combiner::Combiner;
use crate::config::AggregationConfig;
use crate::errors::AggregationResult;
use crate::fetcher::ConcurrentFetcher;
use crate::hooks::{AggregationHooks, TracingHooks};
use crate::model::{CustomerId, CustomerResponse};
use crate::policy::{DeadlinePolicySelector, PolicySelection, RecoveryPolicy};
use crate::pool::WorkerPool;
use crate::sources::{
    CustomerSource, DataSet, InMemoryCustomerSource, InMemoryTransactionSource,
    PurchaseTransactionSource,
};

/// Aggregates a customer with their purchase transactions
#[derive(Clone)]
pub struct CustomerAggregationService {
    customers: Arc<dyn CustomerSource>,
    transactions: Arc<dyn PurchaseTransactionSource>,
    pool: WorkerPool,
    selector: DeadlinePolicySelector,
    fetcher: ConcurrentFetcher,
    applier: PolicyApplier,
    combiner: Combiner,
}

impl CustomerAggregationService {
    /// Create a service logging through [`TracingHooks`]
    pub fn new(
        customers: Arc<dyn CustomerSource>,
        transactions: Arc<dyn PurchaseTransactionSource>,
        pool: WorkerPool,
    ) -> Self {
        Self::assemble(
            customers,
            transactions,
            pool,
            Arc::new(TracingHooks),
            DeadlinePolicySelector::default(),
        )
    }

    /// Build the in-memory sources, data set and pool described by `config`
    pub fn from_config(config: &AggregationConfig) -> AggregationResult<Self> {
        config.validate()?;

        let data = Arc::new(DataSet::generate(&config.dataset));
        let pool = match config.pool.size {
            Some(size) => WorkerPool::new(size)?,
            None => WorkerPool::with_available_parallelism()?,
        };

        info!(
            customers = data.len(),
            pool_size = pool.size(),
            "Aggregation service configured"
        );

        Ok(Self::new(
            Arc::new(InMemoryCustomerSource::new(
                data.clone(),
                config.primary_latency(),
            )),
            Arc::new(InMemoryTransactionSource::new(
                data,
                config.secondary_latency(),
            )),
            pool,
        )
        .with_selector(config.selector()))
    }

    /// Replace the lifecycle hooks
    pub fn with_hooks(self, hooks: Arc<dyn AggregationHooks>) -> Self {
        Self::assemble(
            self.customers,
            self.transactions,
            self.pool,
            hooks,
            self.selector,
        )
    }

    /// Replace the deadline selector
    pub fn with_selector(mut self, selector: DeadlinePolicySelector) -> Self {
        self.selector = selector;
        self
    }

    fn assemble(
        customers: Arc<dyn CustomerSource>,
        transactions: Arc<dyn PurchaseTransactionSource>,
        pool: WorkerPool,
        hooks: Arc<dyn AggregationHooks>,
        selector: DeadlinePolicySelector,
    ) -> Self {
        let fetcher = ConcurrentFetcher::new(
            customers.clone(),
            transactions.clone(),
            pool.clone(),
            hooks.clone(),
        );

        Self {
            customers,
            transactions,
            pool,
            selector,
            fetcher,
            applier: PolicyApplier::new(hooks.clone()),
            combiner: Combiner::new(hooks),
        }
    }

    /// The worker pool lookups run on
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// The selector deriving forced failure and deadline from a key
    pub fn selector(&self) -> &DeadlinePolicySelector {
        &self.selector
    }

    /// Aggregate `key` under `policy`, deriving everything else from the key.
    ///
    /// The failure policies force a secondary failure on even keys. The
    /// deadline policies never force one; they only race the lookup.
    pub async fn get(
        &self,
        key: CustomerId,
        policy: RecoveryPolicy,
    ) -> AggregationResult<CustomerResponse> {
        let forced_failure = self.selector.select(key).forced_failure;
        self.get_with_forced_failure(key, policy, forced_failure)
            .await
    }

    /// Aggregate `key` under `policy` with an explicit failure-injection flag.
    ///
    /// The flag replaces key parity for the failure policies only; the
    /// deadline policies ignore it and still take their deadline from the
    /// selector.
    pub async fn get_with_forced_failure(
        &self,
        key: CustomerId,
        policy: RecoveryPolicy,
        force_failure: bool,
    ) -> AggregationResult<CustomerResponse> {
        let selection = self.selector.select(key);
        let force_failure = force_failure && !policy.is_deadline_family();
        self.run(key, policy, selection, force_failure).await
    }

    /// A failed transaction lookup becomes an empty set
    pub async fn get_with_empty_on_error(
        &self,
        key: CustomerId,
    ) -> AggregationResult<CustomerResponse> {
        self.get(key, RecoveryPolicy::PropagateEmptyOnError).await
    }

    /// One handler sees every transaction outcome and turns failures into an empty set
    pub async fn get_with_unconditional_handler(
        &self,
        key: CustomerId,
    ) -> AggregationResult<CustomerResponse> {
        self.get(key, RecoveryPolicy::SwallowErrorUnconditionally)
            .await
    }

    /// A completion observer logs the transaction outcome; failures fail the call
    pub async fn get_with_completion_observer(
        &self,
        key: CustomerId,
    ) -> AggregationResult<CustomerResponse> {
        self.get(key, RecoveryPolicy::ObserveOnly).await
    }

    /// A transaction lookup slower than its deadline fails the call
    pub async fn get_failing_on_timeout(
        &self,
        key: CustomerId,
    ) -> AggregationResult<CustomerResponse> {
        self.get(key, RecoveryPolicy::FailOnTimeout).await
    }

    /// A transaction lookup slower than its deadline yields an empty set
    pub async fn get_with_default_on_timeout(
        &self,
        key: CustomerId,
    ) -> AggregationResult<CustomerResponse> {
        self.get(key, RecoveryPolicy::DefaultOnTimeout).await
    }

    /// Run [`get`](Self::get) to completion from synchronous code
    pub fn get_blocking(
        &self,
        key: CustomerId,
        policy: RecoveryPolicy,
    ) -> AggregationResult<CustomerResponse> {
        self.pool.block_on(self.get(key, policy))
    }

    async fn run(
        &self,
        key: CustomerId,
        policy: RecoveryPolicy,
        selection: PolicySelection,
        force_failure: bool,
    ) -> AggregationResult<CustomerResponse> {
        info!(
            key,
            %policy,
            pool_size = self.pool.size(),
            force_failure,
            timeout_secs = selection.timeout_seconds(),
            "Aggregating customer"
        );
        let started = Instant::now();

        let launched = self.fetcher.launch(key, force_failure);
        let secondary = self
            .applier
            .apply(policy, selection, key, launched.secondary);
        let result = self.combiner.join(key, launched.primary, secondary).await;

        let elapsed = started.elapsed();
        match &result {
            Ok(customer) => info!(
                key,
                %policy,
                transactions = customer.transaction_count().unwrap_or_default(),
                elapsed_secs = elapsed.as_secs_f64(),
                "Operation finished"
            ),
            Err(err) => warn!(
                key,
                %policy,
                error = %err,
                elapsed_secs = elapsed.as_secs_f64(),
                "Operation failed"
            ),
        }

        result
    }
}

impl std::fmt::Debug for CustomerAggregationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomerAggregationService")
            .field("pool", &self.pool)
            .field("selector", &self.selector)
            .finish_non_exhaustive()
    }
}
