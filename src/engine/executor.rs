// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use crate::config::BackendMap;
use crate::engine::call::BackendCall;
use crate::engine::pool::WorkerPool;
use crate::errors::BackendError;
use crate::model::{BackendId, BackendOutcome, BackendResult, StageOutput, WorkUnit};

/// Fan-out/fan-in executor for one pipeline stage.
///
/// Every call is spawned onto the injected [`WorkerPool`], acquires a pool
/// permit, and is joined before the executor returns. Results always come
/// back in the order of the input assignments, never in completion order.
///
/// ## Shapes
///
/// - [`FanOutExecutor::broadcast`]: the same unit for every backend
/// - [`FanOutExecutor::dispatch`]: distinct units per backend
/// - [`FanOutExecutor::cross_product`]: every backend × every unit, joined
///   as one stage and folded back into one result per backend
/// - [`FanOutExecutor::defer`]: a whole pipeline as one background task
///
/// A panicking backend is contained to its own task; the join turns the
/// panic into a `Failure` for that backend and siblings are unaffected.
#[derive(Clone)]
pub struct FanOutExecutor {
    pool: Arc<WorkerPool>,
    call: BackendCall,
}

impl FanOutExecutor {
    pub fn new(pool: Arc<WorkerPool>, backends: BackendMap) -> Self {
        Self {
            pool,
            call: BackendCall::new(backends),
        }
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    pub fn backends(&self) -> &BackendMap {
        self.call.backends()
    }

    /// Send one unit to every backend in `backend_ids`.
    pub async fn broadcast(&self, backend_ids: &[BackendId], work: WorkUnit) -> Vec<BackendResult<StageOutput>> {
        let work = Arc::new(work);
        let assignments = backend_ids
            .iter()
            .map(|id| (id.clone(), Arc::clone(&work)))
            .collect();
        self.dispatch(assignments).await
    }

    /// Run each `(backend, unit)` assignment concurrently; one result per
    /// assignment, same order. A backend may appear more than once.
    pub async fn dispatch(&self, assignments: Vec<(BackendId, Arc<WorkUnit>)>) -> Vec<BackendResult<StageOutput>> {
        let dispatched = Instant::now();
        let mut tasks = Vec::with_capacity(assignments.len());

        for (backend_id, work) in assignments {
            let call = self.call.clone();
            let permits = self.pool.permits();
            let task_backend = backend_id.clone();
            let task_work = Arc::clone(&work);

            let task = self.pool.spawn(async move {
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return BackendResult::failure(
                            task_backend,
                            BackendError::PoolShutdown,
                            Duration::ZERO,
                            task_work,
                        )
                    }
                };
                call.invoke(task_backend, task_work).await
            });

            tasks.push((backend_id, work, task));
        }

        // Join in submission order
        let mut results = Vec::with_capacity(tasks.len());
        for (backend_id, work, task) in tasks {
            let result = match task.await {
                Ok(result) => result,
                Err(join_error) => BackendResult::failure(
                    backend_id,
                    BackendError::Panicked(join_error.to_string()),
                    dispatched.elapsed(),
                    work,
                ),
            };
            results.push(result);
        }
        results
    }

    /// Launch every backend × unit call together and fold them back into one
    /// result per backend, in `backend_ids` order.
    ///
    /// Calls land in pre-sized slots indexed `backend * units + unit`. A
    /// backend succeeds with a [`StageOutput::Batch`] in unit order when all
    /// of its calls succeed; otherwise it fails with its first failure in
    /// unit order. The reported duration is the slowest of its calls.
    ///
    /// With no units at all nothing is called and every backend fails with
    /// [`BackendError::NoWorkPlanned`].
    pub async fn cross_product(
        &self,
        backend_ids: &[BackendId],
        units: Vec<WorkUnit>,
    ) -> Vec<BackendResult<StageOutput>> {
        let units: Vec<Arc<WorkUnit>> = units.into_iter().map(Arc::new).collect();
        let combined = Arc::new(WorkUnit::Batch(units.iter().map(|u| (**u).clone()).collect()));

        if units.is_empty() {
            return backend_ids
                .iter()
                .map(|id| {
                    BackendResult::failure(
                        id.clone(),
                        BackendError::NoWorkPlanned(id.clone()),
                        Duration::ZERO,
                        Arc::clone(&combined),
                    )
                })
                .collect();
        }

        let assignments = backend_ids
            .iter()
            .flat_map(|id| units.iter().map(move |unit| (id.clone(), Arc::clone(unit))))
            .collect();
        let mut slots = self.dispatch(assignments).await.into_iter();

        let mut results = Vec::with_capacity(backend_ids.len());
        for backend_id in backend_ids {
            let mut outputs = Vec::with_capacity(units.len());
            let mut first_error = None;
            let mut slowest = Duration::ZERO;

            for result in slots.by_ref().take(units.len()) {
                slowest = slowest.max(result.duration());
                match result.outcome {
                    BackendOutcome::Success { value, .. } => outputs.push(value),
                    BackendOutcome::Failure { error, .. } => {
                        first_error.get_or_insert(error);
                    }
                }
            }

            let result = match first_error {
                Some(error) => BackendResult::failure(backend_id.clone(), error, slowest, Arc::clone(&combined)),
                None => BackendResult::success(
                    backend_id.clone(),
                    StageOutput::Batch(outputs),
                    slowest,
                    Arc::clone(&combined),
                ),
            };
            results.push(result);
        }
        results
    }

    /// Run a whole pipeline as one tracked task on the pool.
    pub fn defer<F>(&self, pipeline: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.pool.spawn(pipeline)
    }
}
