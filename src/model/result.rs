// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::BackendError;
use crate::model::{BackendId, WorkUnit};
use std::sync::Arc;
use std::time::Duration;

/// Tagged outcome of one backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendOutcome<T> {
    Success { value: T, duration: Duration },
    Failure { error: BackendError, duration: Duration },
}

/// Result of invoking one backend with one unit of work.
///
/// Created once when the call completes and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct BackendResult<T> {
    pub backend_id: BackendId,
    pub outcome: BackendOutcome<T>,
    pub request: Arc<WorkUnit>,
}

impl<T> BackendResult<T> {
    pub fn success(backend_id: BackendId, value: T, duration: Duration, request: Arc<WorkUnit>) -> Self {
        Self {
            backend_id,
            outcome: BackendOutcome::Success { value, duration },
            request,
        }
    }

    pub fn failure(
        backend_id: BackendId,
        error: BackendError,
        duration: Duration,
        request: Arc<WorkUnit>,
    ) -> Self {
        Self {
            backend_id,
            outcome: BackendOutcome::Failure { error, duration },
            request,
        }
    }

    pub fn from_result(
        backend_id: BackendId,
        result: Result<T, BackendError>,
        duration: Duration,
        request: Arc<WorkUnit>,
    ) -> Self {
        match result {
            Ok(value) => Self::success(backend_id, value, duration, request),
            Err(error) => Self::failure(backend_id, error, duration, request),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, BackendOutcome::Success { .. })
    }

    pub fn value(&self) -> Option<&T> {
        match &self.outcome {
            BackendOutcome::Success { value, .. } => Some(value),
            BackendOutcome::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&BackendError> {
        match &self.outcome {
            BackendOutcome::Success { .. } => None,
            BackendOutcome::Failure { error, .. } => Some(error),
        }
    }

    pub fn duration(&self) -> Duration {
        match &self.outcome {
            BackendOutcome::Success { duration, .. } | BackendOutcome::Failure { duration, .. } => {
                *duration
            }
        }
    }
}
