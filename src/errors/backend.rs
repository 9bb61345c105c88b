// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Per-backend failures.
//!
//! These never escape the executor as `Err`: the backend call boundary turns
//! every one of them into `BackendOutcome::Failure`, which the pipeline then
//! turns into an exclusion.

use crate::model::BackendId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    /// The backend client reported a failure.
    #[error("backend call failed: {0}")]
    Call(String),

    /// The structured response lacks fields the stage expects.
    #[error("response does not match shape '{shape}': missing fields {missing:?}")]
    ShapeMismatch { shape: String, missing: Vec<String> },

    /// The response is not a JSON object at all.
    #[error("response for shape '{shape}' is not a structured object")]
    NotStructured { shape: String },

    /// Fewer embedding vectors than requested texts.
    #[error("embedding returned {actual} vectors for {expected} texts")]
    InsufficientEmbeddings { expected: usize, actual: usize },

    #[error("unknown backend '{0}'")]
    UnknownBackend(BackendId),

    /// The metric planned no work for this backend at this stage.
    #[error("no work planned for backend '{0}'")]
    NoWorkPlanned(BackendId),

    #[error("operation '{0}' is not supported by this backend")]
    Unsupported(&'static str),

    /// The task running the call panicked or was aborted.
    #[error("backend call panicked: {0}")]
    Panicked(String),

    #[error("worker pool is shut down")]
    PoolShutdown,

    /// A compute stage or the final scoring step rejected this backend's output.
    #[error("computation failed: {0}")]
    Compute(String),
}

impl BackendError {
    pub fn call(message: impl Into<String>) -> Self {
        BackendError::Call(message.into())
    }
}
