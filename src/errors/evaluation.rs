// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Terminal failures of one evaluation.
///
/// Per-backend problems are not listed here; they are recorded as exclusions
/// and only surface as [`EvaluationError::AllBackendsFailed`] once no backend
/// is left.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    /// The backend set was empty before the first stage ran
    #[error("metric '{metric}' has no backends to evaluate with")]
    NoBackends { metric: String },

    /// The metric declares no stages
    #[error("metric '{metric}' declares no stages")]
    EmptyPipeline { metric: String },

    /// Every backend still active failed the same stage
    #[error("metric '{metric}' failed: every backend failed at stage '{stage_name}' (index {stage_index})")]
    AllBackendsFailed {
        metric: String,
        stage_name: String,
        stage_index: usize,
    },

    /// The sample lacks something the metric needs
    #[error("metric '{metric}' rejected the sample: {source}")]
    InvalidSample {
        metric: String,
        #[source]
        source: MetricError,
    },

    /// The metric could not plan a stage
    #[error("metric '{metric}' could not plan stage {stage_index}: {source}")]
    StagePlanning {
        metric: String,
        stage_index: usize,
        #[source]
        source: MetricError,
    },

    /// A deferred evaluation task panicked or was cancelled
    #[error("deferred evaluation of '{metric}' did not complete: {reason}")]
    Deferred { metric: String, reason: String },

    #[error("worker pool is shut down")]
    PoolShutdown,
}

/// Errors raised by metric glue code (stage planning, compute stages, scoring)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricError {
    #[error("sample field '{0}' is required")]
    MissingField(&'static str),

    #[error("malformed output: {0}")]
    Malformed(String),

    #[error("stage {0} is not a compute stage")]
    NotComputeStage(usize),

    #[error("stage {0} is out of range")]
    StageOutOfRange(usize),

    #[error("unknown metric '{0}'")]
    UnknownMetric(String),

    #[error("invalid option '{option}': {reason}")]
    InvalidOption { option: String, reason: String },
}
