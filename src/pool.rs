// Copyright 2025 Cowboy AI, LLC.

//! Explicitly sized worker pool the branches run on
//!
//! A pool either owns a dedicated multi-thread tokio runtime, or borrows the
//! handle of a runtime the caller already drives. Both lookups of a call are
//! spawned onto the same pool; nothing partitions workers between them.

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::errors::{AggregationError, AggregationResult};

/// Worker pool shared by every call of a service
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    handle: Handle,
    size: usize,
    runtime: Option<Runtime>,
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        // Detached lookups may still be sleeping; do not wait for them.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.inner.size)
            .field("owned", &self.is_owned())
            .finish()
    }
}

impl WorkerPool {
    /// Build a dedicated runtime with `size` worker threads
    pub fn new(size: usize) -> AggregationResult<Self> {
        if size == 0 {
            return Err(AggregationError::Configuration(
                "worker pool size must be at least 1".to_string(),
            ));
        }

        let runtime = Builder::new_multi_thread()
            .worker_threads(size)
            .thread_name("cim-aggregation-worker")
            .enable_all()
            .build()
            .map_err(|e| AggregationError::Configuration(format!("failed to start worker pool: {e}")))?;

        debug!(size, "Worker pool started");

        Ok(Self {
            inner: Arc::new(PoolInner {
                handle: runtime.handle().clone(),
                size,
                runtime: Some(runtime),
            }),
        })
    }

    /// Build a dedicated runtime sized to the host's available parallelism
    pub fn with_available_parallelism() -> AggregationResult<Self> {
        Self::new(available_parallelism())
    }

    /// Borrow an existing runtime. `size` is reported, not enforced.
    pub fn from_handle(handle: Handle, size: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                handle,
                size,
                runtime: None,
            }),
        }
    }

    /// Borrow the runtime the caller is running on
    pub fn current() -> AggregationResult<Self> {
        let handle = Handle::try_current()
            .map_err(|e| AggregationError::Configuration(format!("no runtime available: {e}")))?;
        Ok(Self::from_handle(handle, available_parallelism()))
    }

    /// Number of workers this pool was sized for
    pub fn size(&self) -> usize {
        self.inner.size
    }

    /// Whether the pool owns its runtime
    pub fn is_owned(&self) -> bool {
        self.inner.runtime.is_some()
    }

    /// Spawn a task onto the pool.
    ///
    /// Dropping the returned handle detaches the task; it is not aborted.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.inner.handle.spawn(future)
    }

    /// Drive `future` to completion from synchronous code.
    ///
    /// Must not be called from inside an async context.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.inner.handle.block_on(future)
    }
}

/// Host parallelism, falling back to a single worker
pub fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_sized_pool_is_rejected() {
        let err = WorkerPool::new(0).unwrap_err();
        assert!(matches!(err, AggregationError::Configuration(_)));
    }

    #[test]
    fn test_owned_pool_runs_tasks() {
        let pool = WorkerPool::new(2).unwrap();
        assert_eq!(pool.size(), 2);
        assert!(pool.is_owned());

        let handle = pool.spawn(async { 40 + 2 });
        let value = pool.block_on(handle).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_available_parallelism_is_positive() {
        assert!(available_parallelism() >= 1);

        let pool = WorkerPool::with_available_parallelism().unwrap();
        assert_eq!(pool.size(), available_parallelism());
    }

    #[tokio::test]
    async fn test_borrowed_pool_uses_current_runtime() {
        let pool = WorkerPool::current().unwrap();
        assert!(!pool.is_owned());

        let value = pool.spawn(async { "spawned" }).await.unwrap();
        assert_eq!(value, "spawned");
    }

    #[tokio::test]
    async fn test_dropping_owned_pool_inside_async_context_does_not_panic() {
        let pool = WorkerPool::new(1).unwrap();
        drop(pool);
    }

    #[test]
    fn test_current_without_runtime_fails() {
        assert!(WorkerPool::current().is_err());
    }
}
