// Copyright 2025 Cowboy AI, LLC.

//! Explicit asynchronous computations and their combinators
//!
//! A [`Computation`] is a boxed future tagged with the [`Branch`] it belongs
//! to. Combinators wrap the inner future and return a new computation:
//!
//! - [`map`](Computation::map): transform a success value
//! - [`recover`](Computation::recover): error-only hook, never runs on success
//! - [`handle`](Computation::handle): unconditional hook, runs on both paths
//!   and may substitute a value or rethrow a different error
//! - [`observe`](Computation::observe): side effect on completion, no substitution
//! - [`with_deadline`](Computation::with_deadline) and
//!   [`with_deadline_or_else`](Computation::with_deadline_or_else): race against a timer
//! - [`await_all`](Computation::await_all): barrier join of two computations
//!
//! Computations created with [`spawn`](Computation::spawn) run on the worker
//! pool from the moment they are created. Losing a deadline race only drops
//! the join handle, so the spawned lookup keeps running and its eventual
//! result is discarded.

use std::future::{Future, IntoFuture};
use std::time::Duration;

use futures::future::{self, BoxFuture, FutureExt};
use tokio::time::Instant;

use crate::errors::{AggregationError, AggregationResult};
use crate::outcome::{Branch, ExecutionOutcome, OutcomeKind};
use crate::pool::WorkerPool;

/// A pending result on one branch of an aggregation
pub struct Computation<T> {
    branch: Branch,
    inner: BoxFuture<'static, AggregationResult<T>>,
}

impl<T> std::fmt::Debug for Computation<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computation")
            .field("branch", &self.branch)
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> Computation<T> {
    /// Start `future` on the pool immediately
    pub fn spawn<F>(pool: &WorkerPool, branch: Branch, future: F) -> Self
    where
        F: Future<Output = AggregationResult<T>> + Send + 'static,
    {
        let handle = pool.spawn(future);
        Self {
            branch,
            inner: async move { handle.await? }.boxed(),
        }
    }

    /// Wrap a future without spawning it; it runs when awaited
    pub fn from_future<F>(branch: Branch, future: F) -> Self
    where
        F: Future<Output = AggregationResult<T>> + Send + 'static,
    {
        Self {
            branch,
            inner: future.boxed(),
        }
    }

    /// An already settled computation
    pub fn ready(branch: Branch, result: AggregationResult<T>) -> Self {
        Self {
            branch,
            inner: future::ready(result).boxed(),
        }
    }

    /// Branch this computation belongs to
    pub fn branch(&self) -> Branch {
        self.branch
    }

    /// Transform the success value
    pub fn map<U, F>(self, f: F) -> Computation<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        Computation {
            branch: self.branch,
            inner: self.inner.map(|result| result.map(f)).boxed(),
        }
    }

    /// Error-only hook: `f` runs only if the computation failed
    pub fn recover<F, Fut>(self, f: F) -> Self
    where
        F: FnOnce(AggregationError) -> Fut + Send + 'static,
        Fut: Future<Output = AggregationResult<T>> + Send + 'static,
    {
        let inner = self.inner;
        Self {
            branch: self.branch,
            inner: async move {
                match inner.await {
                    Ok(value) => Ok(value),
                    Err(err) => f(err).await,
                }
            }
            .boxed(),
        }
    }

    /// Unconditional hook: `f` receives the result whether it succeeded or not
    pub fn handle<U, F, Fut>(self, f: F) -> Computation<U>
    where
        U: Send + 'static,
        F: FnOnce(AggregationResult<T>) -> Fut + Send + 'static,
        Fut: Future<Output = AggregationResult<U>> + Send + 'static,
    {
        let inner = self.inner;
        Computation {
            branch: self.branch,
            inner: async move { f(inner.await).await }.boxed(),
        }
    }

    /// Run `f` on completion without touching the result
    pub fn observe<F, Fut>(self, f: F) -> Self
    where
        F: FnOnce(OutcomeKind) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let inner = self.inner;
        Self {
            branch: self.branch,
            inner: async move {
                let result = inner.await;
                f(OutcomeKind::of(&result)).await;
                result
            }
            .boxed(),
        }
    }

    /// Fail with [`AggregationError::Timeout`] if not settled within `deadline`
    pub fn with_deadline(self, deadline: Duration) -> Self {
        let branch = self.branch;
        self.with_deadline_or_else(deadline, move |after| async move {
            Err(AggregationError::Timeout { branch, after })
        })
    }

    /// Race against `deadline`; if the timer wins, settle with `on_timeout`.
    ///
    /// The deadline is measured from this call, not from the first poll.
    pub fn with_deadline_or_else<F, Fut>(self, deadline: Duration, on_timeout: F) -> Self
    where
        F: FnOnce(Duration) -> Fut + Send + 'static,
        Fut: Future<Output = AggregationResult<T>> + Send + 'static,
    {
        let expires_at = Instant::now() + deadline;
        let inner = self.inner;
        Self {
            branch: self.branch,
            inner: async move {
                match tokio::time::timeout_at(expires_at, inner).await {
                    Ok(result) => result,
                    Err(_elapsed) => on_timeout(deadline).await,
                }
            }
            .boxed(),
        }
    }

    /// Settle and classify, never failing
    pub async fn outcome(self) -> ExecutionOutcome<T> {
        ExecutionOutcome::from_result(self.inner.await)
    }

    /// Barrier join: wait until both computations have settled
    pub async fn await_all<U: Send + 'static>(
        first: Computation<T>,
        second: Computation<U>,
    ) -> (AggregationResult<T>, AggregationResult<U>) {
        future::join(first.inner, second.inner).await
    }
}

impl<T: Send + 'static> IntoFuture for Computation<T> {
    type Output = AggregationResult<T>;
    type IntoFuture = BoxFuture<'static, AggregationResult<T>>;

    fn into_future(self) -> Self::IntoFuture {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn failing() -> Computation<u32> {
        Computation::ready(
            Branch::Secondary,
            Err(AggregationError::source_unavailable("test", "boom")),
        )
    }

    #[tokio::test]
    async fn test_recover_runs_only_on_error() {
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let ok = Computation::ready(Branch::Secondary, Ok(7u32))
            .recover(move |_| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(0)
            })
            .await;
        assert_eq!(ok.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let counter = calls.clone();
        let recovered = failing()
            .recover(move |_| async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(0)
            })
            .await;
        assert_eq!(recovered.unwrap(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handle_runs_on_both_paths() {
        let calls = Arc::new(AtomicUsize::new(0));

        for computation in [Computation::ready(Branch::Secondary, Ok(3u32)), failing()] {
            let counter = calls.clone();
            let result = computation
                .handle(move |result| async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(result.unwrap_or(0))
                })
                .await;
            assert!(result.is_ok());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_handle_can_rethrow_a_different_error() {
        let result = failing()
            .handle(|result| async move {
                result.map_err(|e| AggregationError::TaskFailed(format!("rethrown: {e}")))
            })
            .await;

        assert!(matches!(result, Err(AggregationError::TaskFailed(msg)) if msg.starts_with("rethrown")));
    }

    #[tokio::test]
    async fn test_observe_does_not_substitute() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));

        let sink = seen.clone();
        let result = failing()
            .observe(move |kind| async move {
                sink.lock().unwrap().push(kind);
            })
            .await;

        assert!(result.unwrap_err().is_source_unavailable());
        assert_eq!(*seen.lock().unwrap(), vec![OutcomeKind::Failure]);
    }

    #[tokio::test]
    async fn test_map_transforms_success() {
        let result = Computation::ready(Branch::Primary, Ok(2u32))
            .map(|v| v * 10)
            .await;
        assert_eq!(result.unwrap(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_times_out_slow_computation() {
        let slow = Computation::from_future(Branch::Secondary, async {
            tokio::time::sleep(Duration::from_secs(4)).await;
            Ok(1u32)
        });

        let err = slow.with_deadline(Duration::from_secs(2)).await.unwrap_err();
        match err {
            AggregationError::Timeout { branch, after } => {
                assert_eq!(branch, Branch::Secondary);
                assert_eq!(after, Duration::from_secs(2));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_passes_fast_computation() {
        let fast = Computation::from_future(Branch::Secondary, async {
            tokio::time::sleep(Duration::from_secs(4)).await;
            Ok(1u32)
        });

        let value = fast.with_deadline(Duration::from_secs(5)).await.unwrap();
        assert_eq!(value, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_or_else_substitutes() {
        let slow = Computation::from_future(Branch::Secondary, async {
            tokio::time::sleep(Duration::from_secs(4)).await;
            Ok(1u32)
        });

        let value = slow
            .with_deadline_or_else(Duration::from_secs(2), |_| async { Ok(0) })
            .await
            .unwrap();
        assert_eq!(value, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_starts_when_attached() {
        let pool = WorkerPool::current().unwrap();
        let spawned = Computation::spawn(&pool, Branch::Secondary, async {
            tokio::time::sleep(Duration::from_secs(4)).await;
            Ok(1u32)
        })
        .with_deadline(Duration::from_secs(2));

        tokio::time::sleep(Duration::from_secs(3)).await;
        let awaited_at = Instant::now();

        assert!(spawned.await.unwrap_err().is_timeout());
        assert_eq!(awaited_at.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_computation_survives_lost_deadline() {
        let pool = WorkerPool::current().unwrap();
        let finished = Arc::new(AtomicUsize::new(0));

        let flag = finished.clone();
        let spawned = Computation::spawn(&pool, Branch::Secondary, async move {
            tokio::time::sleep(Duration::from_secs(4)).await;
            flag.fetch_add(1, Ordering::SeqCst);
            Ok(1u32)
        });

        let result = spawned.with_deadline(Duration::from_secs(2)).await;
        assert!(result.unwrap_err().is_timeout());
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_all_waits_for_both() {
        let start = tokio::time::Instant::now();
        let fast = Computation::from_future(Branch::Primary, async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Err::<u32, _>(AggregationError::CustomerNotFound(1))
        });
        let slow = Computation::from_future(Branch::Secondary, async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Ok("done")
        });

        let (first, second) = Computation::await_all(fast, slow).await;
        assert!(first.is_err());
        assert_eq!(second.unwrap(), "done");
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_outcome_classifies_timeout() {
        let timed_out: Computation<u32> = Computation::ready(
            Branch::Secondary,
            Err(AggregationError::Timeout {
                branch: Branch::Secondary,
                after: Duration::from_secs(2),
            }),
        );
        assert_eq!(timed_out.outcome().await.kind(), OutcomeKind::TimedOut);
    }
}
