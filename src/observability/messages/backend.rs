// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for individual backend calls.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// Backend call returned a usable result.
///
/// # Log Level
/// `debug!` - Per-call detail
pub struct BackendCallCompleted<'a> {
    pub backend_id: &'a str,
    pub kind: &'a str,
    pub duration: Duration,
}

impl Display for BackendCallCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Backend '{}' completed {} call in {:?}",
            self.backend_id, self.kind, self.duration
        )
    }
}

impl StructuredLog for BackendCallCompleted<'_> {
    fn log(&self) {
        tracing::debug!(
            backend_id = self.backend_id,
            kind = self.kind,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "backend_call",
            span_name = name,
            backend_id = self.backend_id,
            kind = self.kind,
        )
    }
}

/// Backend call failed; the failure is kept as data.
///
/// # Log Level
/// `debug!` - The pipeline reports the resulting exclusion at `warn!`
///
/// # Example
/// ```
/// use the_jury::observability::messages::backend::BackendCallFailed;
/// use the_jury::errors::BackendError;
/// use std::time::Duration;
///
/// let error = BackendError::call("HTTP 503");
/// let msg = BackendCallFailed {
///     backend_id: "judge-c",
///     error: &error,
///     duration: Duration::from_millis(40),
/// };
///
/// tracing::debug!("{}", msg);
/// ```
pub struct BackendCallFailed<'a> {
    pub backend_id: &'a str,
    pub error: &'a dyn std::error::Error,
    pub duration: Duration,
}

impl Display for BackendCallFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Backend '{}' failed after {:?}: {}",
            self.backend_id, self.duration, self.error
        )
    }
}

impl StructuredLog for BackendCallFailed<'_> {
    fn log(&self) {
        tracing::debug!(
            backend_id = self.backend_id,
            error = %self.error,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "backend_call_failed",
            span_name = name,
            backend_id = self.backend_id,
            error = %self.error,
        )
    }
}
