// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::{BackendMap, JuryConfig};
use crate::engine::WorkerPool;
use crate::errors::RuntimeError;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Jury runtime builder - creates the worker pool and backend map from configuration.
///
/// # Examples
///
/// ```
/// use the_jury::config::{RuntimeBuilder, JuryConfig};
///
/// let config: JuryConfig = serde_yaml::from_str(r#"
/// pool: { max_concurrency: 2, worker_threads: 1 }
/// backends:
///   - id: judge-a
///     type: scripted
/// "#).unwrap();
///
/// let (pool, backends) = RuntimeBuilder::from_config(&config).unwrap();
/// assert_eq!(pool.max_concurrency(), 2);
/// assert_eq!(backends.len(), 1);
/// pool.shutdown_blocking(std::time::Duration::from_secs(1));
/// ```
pub struct RuntimeBuilder;

impl RuntimeBuilder {
    /// Build a pool with its own runtime plus every configured backend.
    ///
    /// Backends are created first so a bad backend never starts threads.
    pub fn from_config(cfg: &JuryConfig) -> Result<(Arc<WorkerPool>, BackendMap), RuntimeError> {
        let backends = BackendMap::from_config(cfg)?;
        let pool = WorkerPool::new(cfg.pool.get_worker_threads(), cfg.pool.get_max_concurrency())?;
        Ok((Arc::new(pool), backends))
    }

    /// Build on a runtime the caller already runs; `worker_threads` is ignored.
    pub fn with_handle(cfg: &JuryConfig, handle: Handle) -> Result<(Arc<WorkerPool>, BackendMap), RuntimeError> {
        let backends = BackendMap::from_config(cfg)?;
        let pool = WorkerPool::with_handle(handle, cfg.pool.get_max_concurrency());
        Ok((Arc::new(pool), backends))
    }
}
