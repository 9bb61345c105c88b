// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

/// Bounded worker pool shared by every evaluation that runs on it.
///
/// The pool is an explicit resource: the application creates it, hands it to
/// the executors that need it, and shuts it down. Two flavors exist:
///
/// - [`WorkerPool::new`] owns a dedicated multi-threaded runtime whose
///   threads are named `jury-worker`.
/// - [`WorkerPool::with_handle`] attaches to a runtime the application
///   already runs.
///
/// In both cases at most `max_concurrency` backend calls are in flight at a
/// time, enforced with a semaphore the same way every fan-out in the engine
/// acquires its permit before calling a backend.
///
/// # Examples
///
/// ```
/// use the_jury::engine::WorkerPool;
/// use std::time::Duration;
///
/// let pool = WorkerPool::new(2, 4).unwrap();
/// let answer = pool.block_on(async { 40 + 2 });
/// assert_eq!(answer, 42);
/// pool.shutdown_blocking(Duration::from_secs(1));
/// ```
pub struct WorkerPool {
    handle: Handle,
    runtime: Mutex<Option<Runtime>>,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    max_concurrency: usize,
}

impl WorkerPool {
    /// Create a pool with its own runtime.
    pub fn new(worker_threads: usize, max_concurrency: usize) -> std::io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .thread_name("jury-worker")
            .enable_all()
            .build()?;
        let handle = runtime.handle().clone();
        Ok(Self::build(handle, Some(runtime), max_concurrency))
    }

    /// Create a pool on an existing runtime.
    pub fn with_handle(handle: Handle, max_concurrency: usize) -> Self {
        Self::build(handle, None, max_concurrency)
    }

    fn build(handle: Handle, runtime: Option<Runtime>, max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            handle,
            runtime: Mutex::new(runtime),
            permits: Arc::new(Semaphore::new(max_concurrency)),
            tracker: TaskTracker::new(),
            max_concurrency,
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// True once `shutdown` or `shutdown_blocking` has been called.
    pub fn is_shut_down(&self) -> bool {
        self.tracker.is_closed()
    }

    pub(crate) fn permits(&self) -> Arc<Semaphore> {
        Arc::clone(&self.permits)
    }

    /// Spawn a tracked task onto the pool's runtime.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.tracker.spawn_on(future, &self.handle)
    }

    /// Drive a future to completion from synchronous code.
    ///
    /// Must not be called from inside an async context.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.handle.block_on(future)
    }

    /// Stop accepting backend calls and wait for every tracked task.
    ///
    /// Calls that have not yet acquired a permit fail with
    /// `BackendError::PoolShutdown`.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.permits.close();
        self.tracker.wait().await;
    }

    /// Shut down from synchronous code, then stop the owned runtime (if any).
    pub fn shutdown_blocking(&self, timeout: Duration) {
        self.tracker.close();
        self.permits.close();

        let runtime = match self.runtime.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        match runtime {
            Some(runtime) => {
                runtime.block_on(self.tracker.wait());
                runtime.shutdown_timeout(timeout);
            }
            None => self.handle.block_on(self.tracker.wait()),
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("max_concurrency", &self.max_concurrency)
            .field("tracked_tasks", &self.tracker.len())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
