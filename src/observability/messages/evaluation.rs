// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for evaluation lifecycle events.
//!
//! This module contains message types for logging events related to:
//! * Evaluation start, completion and terminal failure
//! * Stage start and completion
//! * Backend exclusion

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// Evaluation started.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use the_jury::observability::messages::evaluation::EvaluationStarted;
///
/// let msg = EvaluationStarted {
///     evaluation_id: 1,
///     metric: "rubrics_score",
///     backend_count: 3,
///     total_stages: 1,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct EvaluationStarted<'a> {
    pub evaluation_id: u64,
    pub metric: &'a str,
    pub backend_count: usize,
    pub total_stages: usize,
}

impl Display for EvaluationStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Starting evaluation #{} of '{}': {} backends, {} stages",
            self.evaluation_id, self.metric, self.backend_count, self.total_stages
        )
    }
}

impl StructuredLog for EvaluationStarted<'_> {
    fn log(&self) {
        tracing::info!(
            evaluation_id = self.evaluation_id,
            metric = self.metric,
            backend_count = self.backend_count,
            total_stages = self.total_stages,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "evaluation",
            span_name = name,
            evaluation_id = self.evaluation_id,
            metric = self.metric,
            backend_count = self.backend_count,
            total_stages = self.total_stages,
        )
    }
}

/// Evaluation produced an aggregated score.
///
/// # Log Level
/// `info!` - Important operational event
pub struct EvaluationCompleted<'a> {
    pub evaluation_id: u64,
    pub metric: &'a str,
    pub score: f64,
    pub scored_backends: usize,
    pub excluded_backends: usize,
    pub duration: Duration,
}

impl Display for EvaluationCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Evaluation #{} of '{}' completed: score={:.4} from {} backends ({} excluded) in {:?}",
            self.evaluation_id,
            self.metric,
            self.score,
            self.scored_backends,
            self.excluded_backends,
            self.duration
        )
    }
}

impl StructuredLog for EvaluationCompleted<'_> {
    fn log(&self) {
        tracing::info!(
            evaluation_id = self.evaluation_id,
            metric = self.metric,
            score = self.score,
            scored_backends = self.scored_backends,
            excluded_backends = self.excluded_backends,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "evaluation_completed",
            span_name = name,
            evaluation_id = self.evaluation_id,
            metric = self.metric,
            score = self.score,
            duration = ?self.duration,
        )
    }
}

/// Evaluation failed without producing a score.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use the_jury::observability::messages::evaluation::EvaluationFailed;
/// use the_jury::errors::EvaluationError;
///
/// let error = EvaluationError::NoBackends { metric: "aspect_critic".into() };
/// let msg = EvaluationFailed {
///     evaluation_id: 3,
///     metric: "aspect_critic",
///     error: &error,
/// };
///
/// tracing::error!("{}", msg);
/// ```
pub struct EvaluationFailed<'a> {
    pub evaluation_id: u64,
    pub metric: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for EvaluationFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Evaluation #{} of '{}' failed: {}",
            self.evaluation_id, self.metric, self.error
        )
    }
}

impl StructuredLog for EvaluationFailed<'_> {
    fn log(&self) {
        tracing::error!(
            evaluation_id = self.evaluation_id,
            metric = self.metric,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "evaluation_failed",
            span_name = name,
            evaluation_id = self.evaluation_id,
            metric = self.metric,
            error = %self.error,
        )
    }
}

/// Stage about to fan out.
///
/// # Log Level
/// `debug!` - Per-stage detail
pub struct StageStarted<'a> {
    pub metric: &'a str,
    pub stage: &'a str,
    pub stage_index: usize,
    pub total_stages: usize,
    pub kind: &'a str,
    pub active_backends: usize,
}

impl Display for StageStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Stage {}/{} '{}' ({}) of '{}' starting with {} backends",
            self.stage_index + 1,
            self.total_stages,
            self.stage,
            self.kind,
            self.metric,
            self.active_backends
        )
    }
}

impl StructuredLog for StageStarted<'_> {
    fn log(&self) {
        tracing::debug!(
            metric = self.metric,
            stage = self.stage,
            stage_index = self.stage_index,
            total_stages = self.total_stages,
            kind = self.kind,
            active_backends = self.active_backends,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "stage",
            span_name = name,
            metric = self.metric,
            stage = self.stage,
            stage_index = self.stage_index,
            kind = self.kind,
        )
    }
}

/// Stage joined.
///
/// # Log Level
/// `debug!` - Per-stage detail
pub struct StageCompleted<'a> {
    pub metric: &'a str,
    pub stage: &'a str,
    pub stage_index: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl Display for StageCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Stage '{}' (index {}) of '{}' joined: {} succeeded, {} failed",
            self.stage, self.stage_index, self.metric, self.succeeded, self.failed
        )
    }
}

impl StructuredLog for StageCompleted<'_> {
    fn log(&self) {
        tracing::debug!(
            metric = self.metric,
            stage = self.stage,
            stage_index = self.stage_index,
            succeeded = self.succeeded,
            failed = self.failed,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "stage_completed",
            span_name = name,
            metric = self.metric,
            stage = self.stage,
            stage_index = self.stage_index,
        )
    }
}

/// Backend removed from the rest of an evaluation.
///
/// # Log Level
/// `warn!` - Degraded evaluation, still producing a score
///
/// # Example
/// ```
/// use the_jury::observability::messages::evaluation::BackendExcluded;
///
/// let msg = BackendExcluded {
///     backend_id: "judge-b",
///     stage: "verdict",
///     stage_index: 0,
///     cause: Some("backend call failed: rate limited"),
/// };
///
/// tracing::warn!("{}", msg);
/// ```
pub struct BackendExcluded<'a> {
    pub backend_id: &'a str,
    pub stage: &'a str,
    pub stage_index: usize,
    pub cause: Option<&'a str>,
}

impl Display for BackendExcluded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Backend '{}' excluded at stage '{}' (index {}): {}",
            self.backend_id,
            self.stage,
            self.stage_index,
            self.cause.unwrap_or("no result")
        )
    }
}

impl StructuredLog for BackendExcluded<'_> {
    fn log(&self) {
        tracing::warn!(
            backend_id = self.backend_id,
            stage = self.stage,
            stage_index = self.stage_index,
            cause = self.cause,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "backend_excluded",
            span_name = name,
            backend_id = self.backend_id,
            stage = self.stage,
            stage_index = self.stage_index,
        )
    }
}
