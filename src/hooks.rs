// Copyright 2025 Cowboy AI, LLC.

//! Lifecycle hooks and metrics for aggregation calls
//!
//! Hooks are invoked at fixed points of a call:
//!
//! - `on_start`: a branch's lookup begins on the worker pool
//! - `on_settle`: a branch's lookup finished (also for lookups whose
//!   deadline already elapsed, which keep running in the background)
//! - `on_recover`: a policy substituted a default for a failure
//! - `on_timeout`: a deadline elapsed before the branch settled
//! - `on_observe`: a completion handler inspected the outcome
//! - `on_join`: the barrier join produced the call's result

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::errors::AggregationError;
use crate::model::CustomerId;
use crate::outcome::{Branch, OutcomeKind};

/// Observer of aggregation lifecycle events. Every method defaults to a no-op.
#[async_trait]
pub trait AggregationHooks: Send + Sync {
    /// A lookup started
    async fn on_start(&self, _branch: Branch, _key: CustomerId) {}

    /// A lookup settled after `_elapsed`
    async fn on_settle(
        &self,
        _branch: Branch,
        _key: CustomerId,
        _outcome: OutcomeKind,
        _elapsed: Duration,
    ) {
    }

    /// A failure was replaced by a default value
    async fn on_recover(&self, _branch: Branch, _key: CustomerId, _cause: &AggregationError) {}

    /// A deadline elapsed first
    async fn on_timeout(&self, _branch: Branch, _key: CustomerId, _deadline: Duration) {}

    /// A completion handler ran
    async fn on_observe(&self, _branch: Branch, _key: CustomerId, _outcome: OutcomeKind) {}

    /// The barrier join finished
    async fn on_join(&self, _key: CustomerId, _error: Option<&AggregationError>) {}
}

/// Hooks that do nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

#[async_trait]
impl AggregationHooks for NoopHooks {}

/// Hooks that emit `tracing` events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingHooks;

#[async_trait]
impl AggregationHooks for TracingHooks {
    async fn on_start(&self, branch: Branch, key: CustomerId) {
        info!(%branch, key, "Lookup started");
    }

    async fn on_settle(&self, branch: Branch, key: CustomerId, outcome: OutcomeKind, elapsed: Duration) {
        info!(
            %branch,
            key,
            %outcome,
            elapsed_ms = elapsed.as_millis() as u64,
            "Lookup settled"
        );
    }

    async fn on_recover(&self, branch: Branch, key: CustomerId, cause: &AggregationError) {
        warn!(%branch, key, error = %cause, "Received error, returning empty transactions");
    }

    async fn on_timeout(&self, branch: Branch, key: CustomerId, deadline: Duration) {
        warn!(%branch, key, deadline_secs = deadline.as_secs(), "Deadline elapsed");
    }

    async fn on_observe(&self, branch: Branch, key: CustomerId, outcome: OutcomeKind) {
        info!(%branch, key, %outcome, "Completion handler executed");
    }

    async fn on_join(&self, key: CustomerId, error: Option<&AggregationError>) {
        if let Some(err) = error {
            error!(key, error = %err, "Aggregation failed");
        }
    }
}

/// Fans every event out to several hooks, in order
#[derive(Clone, Default)]
pub struct CompositeHooks {
    hooks: Vec<Arc<dyn AggregationHooks>>,
}

impl CompositeHooks {
    /// Create an empty composite
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a hook
    pub fn with(mut self, hook: Arc<dyn AggregationHooks>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Number of hooks
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether no hooks are registered
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

#[async_trait]
impl AggregationHooks for CompositeHooks {
    async fn on_start(&self, branch: Branch, key: CustomerId) {
        for hook in &self.hooks {
            hook.on_start(branch, key).await;
        }
    }

    async fn on_settle(&self, branch: Branch, key: CustomerId, outcome: OutcomeKind, elapsed: Duration) {
        for hook in &self.hooks {
            hook.on_settle(branch, key, outcome, elapsed).await;
        }
    }

    async fn on_recover(&self, branch: Branch, key: CustomerId, cause: &AggregationError) {
        for hook in &self.hooks {
            hook.on_recover(branch, key, cause).await;
        }
    }

    async fn on_timeout(&self, branch: Branch, key: CustomerId, deadline: Duration) {
        for hook in &self.hooks {
            hook.on_timeout(branch, key, deadline).await;
        }
    }

    async fn on_observe(&self, branch: Branch, key: CustomerId, outcome: OutcomeKind) {
        for hook in &self.hooks {
            hook.on_observe(branch, key, outcome).await;
        }
    }

    async fn on_join(&self, key: CustomerId, error: Option<&AggregationError>) {
        for hook in &self.hooks {
            hook.on_join(key, error).await;
        }
    }
}

/// Counters and settle durations collected across calls
#[derive(Debug, Clone, Default)]
pub struct AggregationMetrics {
    counters: Arc<RwLock<HashMap<String, u64>>>,
    durations: Arc<RwLock<HashMap<String, Vec<Duration>>>>,
}

impl AggregationMetrics {
    /// Measurements kept per operation
    const MAX_SAMPLES: usize = 1000;

    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment a counter
    pub async fn increment(&self, name: &str) {
        let mut counters = self.counters.write().await;
        *counters.entry(name.to_string()).or_insert(0) += 1;
    }

    /// Record a duration for `operation`
    pub async fn record_duration(&self, operation: &str, duration: Duration) {
        let mut durations = self.durations.write().await;
        let samples = durations.entry(operation.to_string()).or_default();
        samples.push(duration);
        if samples.len() > Self::MAX_SAMPLES {
            let excess = samples.len() - Self::MAX_SAMPLES;
            samples.drain(..excess);
        }
    }

    /// Counter value, zero if never incremented
    pub async fn get_counter(&self, name: &str) -> u64 {
        self.counters.read().await.get(name).copied().unwrap_or(0)
    }

    /// Snapshot of every counter and duration series
    pub async fn summary(&self) -> MetricsSummary {
        let counters = self.counters.read().await.clone();
        let durations = self
            .durations
            .read()
            .await
            .iter()
            .filter_map(|(op, samples)| DurationStats::from_samples(samples).map(|s| (op.clone(), s)))
            .collect();

        MetricsSummary {
            counters,
            durations,
        }
    }

    /// Clear everything
    pub async fn reset(&self) {
        self.counters.write().await.clear();
        self.durations.write().await.clear();
    }
}

/// Summary of collected metrics
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    /// Counter values
    pub counters: HashMap<String, u64>,
    /// Duration statistics per operation
    pub durations: HashMap<String, DurationStats>,
}

/// Duration statistics for an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurationStats {
    /// Number of measurements
    pub count: usize,
    /// Average duration
    pub avg: Duration,
    /// 50th percentile
    pub p50: Duration,
    /// 95th percentile
    pub p95: Duration,
    /// Minimum duration
    pub min: Duration,
    /// Maximum duration
    pub max: Duration,
}

impl DurationStats {
    fn from_samples(samples: &[Duration]) -> Option<Self> {
        let mut sorted = samples.to_vec();
        sorted.sort();
        let min = *sorted.first()?;
        let max = *sorted.last()?;
        let at = |p: f64| sorted[((sorted.len() as f64 - 1.0) * p) as usize];

        Some(Self {
            count: sorted.len(),
            avg: sorted.iter().sum::<Duration>() / sorted.len() as u32,
            p50: at(0.5),
            p95: at(0.95),
            min,
            max,
        })
    }
}

/// Hooks that record into [`AggregationMetrics`].
///
/// Counter keys are `<branch>.<event>` (`secondary.recover`,
/// `primary.settle.success`, ...) plus `join.success` / `join.failure`.
#[derive(Debug, Clone, Default)]
pub struct MetricsHooks {
    metrics: AggregationMetrics,
}

impl MetricsHooks {
    /// Create hooks with a fresh collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record into an existing collector
    pub fn with_metrics(metrics: AggregationMetrics) -> Self {
        Self { metrics }
    }

    /// The collector
    pub fn metrics(&self) -> &AggregationMetrics {
        &self.metrics
    }
}

#[async_trait]
impl AggregationHooks for MetricsHooks {
    async fn on_start(&self, branch: Branch, _key: CustomerId) {
        self.metrics.increment(&format!("{branch}.start")).await;
    }

    async fn on_settle(&self, branch: Branch, _key: CustomerId, outcome: OutcomeKind, elapsed: Duration) {
        self.metrics.increment(&format!("{branch}.settle.{outcome}")).await;
        self.metrics.record_duration(&format!("{branch}.settle"), elapsed).await;
    }

    async fn on_recover(&self, branch: Branch, _key: CustomerId, _cause: &AggregationError) {
        self.metrics.increment(&format!("{branch}.recover")).await;
    }

    async fn on_timeout(&self, branch: Branch, _key: CustomerId, _deadline: Duration) {
        self.metrics.increment(&format!("{branch}.timeout")).await;
    }

    async fn on_observe(&self, branch: Branch, _key: CustomerId, _outcome: OutcomeKind) {
        self.metrics.increment(&format!("{branch}.observe")).await;
    }

    async fn on_join(&self, _key: CustomerId, error: Option<&AggregationError>) {
        let name = if error.is_some() { "join.failure" } else { "join.success" };
        self.metrics.increment(name).await;
    }
}
