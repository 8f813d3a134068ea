// Copyright 2025 Cowboy AI, LLC.

//! # CIM Aggregation
//!
//! Concurrent aggregation of a customer record with the customer's purchase
//! transactions, with a selectable recovery policy on the transaction side.
//!
//! Every call runs the same pipeline:
//! - **ConcurrentFetcher**: spawns both lookups onto the worker pool at once
//! - **PolicyApplier**: wraps the transaction lookup in exactly one [`RecoveryPolicy`]
//! - **Combiner**: barrier join producing a [`CustomerResponse`], or a single
//!   `AggregationFailure`
//! - **DeadlinePolicySelector**: derives forced failure and deadline from key parity
//!
//! ## Recovery policies
//!
//! 1. **PropagateEmptyOnError**: error-only hook, failure becomes an empty set
//! 2. **SwallowErrorUnconditionally**: one handler sees both outcomes
//! 3. **ObserveOnly**: completion observer, failures fail the call
//! 4. **FailOnTimeout**: deadline elapses into a `Timeout` failure
//! 5. **DefaultOnTimeout**: deadline elapses into an empty set
//!
//! Timed-out lookups are not cancelled. They keep running on the pool and
//! their result is discarded.

#![warn(missing_docs)]

pub mod applier;
pub mod combiner;
pub mod computation;
pub mod config;
pub mod errors;
pub mod fetcher;
pub mod hooks;
pub mod model;
pub mod outcome;
pub mod policy;
pub mod pool;
pub mod service;
pub mod sources;

pub use applier::PolicyApplier;
pub use combiner::Combiner;
pub use computation::Computation;
pub use config::{AggregationConfig, ConfigError};
pub use errors::{AggregationError, AggregationResult};
pub use fetcher::{ConcurrentFetcher, LaunchedLookups};
pub use hooks::{
    AggregationHooks, AggregationMetrics, CompositeHooks, DurationStats, MetricsHooks,
    MetricsSummary, NoopHooks, TracingHooks,
};
pub use model::{
    Amount, Customer, CustomerId, CustomerResponse, PaymentType, PurchaseTransaction,
    PurchaseTransactionResponse, PurchaseTransactions,
};
pub use outcome::{Branch, ComputationState, ExecutionOutcome, OutcomeKind};
pub use policy::{DeadlinePolicySelector, PolicySelection, RecoveryPolicy, UnknownPolicy};
pub use pool::WorkerPool;
pub use service::CustomerAggregationService;
pub use sources::{
    CustomerSource, DataSet, InMemoryCustomerSource, InMemoryTransactionSource,
    PurchaseTransactionSource,
};
