// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::engine::AggregationMode;
use crate::model::{BackendId, Sample, StageRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-metric settings, treated as opaque data by the engine.
///
/// # Fields
/// * `backends` - Backend subset for this metric; empty means every registered backend
/// * `aggregation` - How per-backend scores are reduced (defaults to `mean`)
/// * `threshold` - Optional pass mark recorded in the outcome metadata
/// * `options` - Metric-specific options
///
/// # Example
/// ```yaml
/// backends: [judge-a, judge-b]
/// aggregation: median
/// threshold: 0.5
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricConfig {
    #[serde(default)]
    pub backends: Vec<BackendId>,
    #[serde(default)]
    pub aggregation: AggregationMode,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub options: BTreeMap<String, serde_json::Value>,
}

impl MetricConfig {
    pub fn with_backends<I, B>(mut self, backends: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<BackendId>,
    {
        self.backends = backends.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_aggregation(mut self, aggregation: AggregationMode) -> Self {
        self.aggregation = aggregation;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }
}

/// Immutable snapshot of one evaluation, built before the first stage.
///
/// Anything an observer needs from the calling side must be captured here or
/// in the observer's own `before_evaluation`; later hooks may run on a
/// different thread. `parent` is the caller's ambient report parent, read on
/// the calling thread when the pipeline has a parent source.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    pub evaluation_id: u64,
    pub metric_name: String,
    pub sample: Arc<Sample>,
    pub config: Arc<MetricConfig>,
    pub backend_ids: Vec<BackendId>,
    pub total_stages: usize,
    /// Name of the thread that started the evaluation, if it has one
    pub caller_thread: Option<String>,
    pub parent: Option<String>,
    pub started_at: Instant,
}

/// A backend dropped out of an evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct ExclusionEvent {
    pub backend_id: BackendId,
    pub failed_stage_name: String,
    pub failed_stage_index: usize,
    /// `None` when the backend was simply missing from the stage's results
    pub cause: Option<String>,
}

/// Result of a successful evaluation. Never built on failure.
#[derive(Debug, Clone)]
pub struct EvaluationOutcome {
    pub evaluation_id: u64,
    pub metric_name: String,
    pub aggregated_score: f64,
    pub per_backend_scores: BTreeMap<BackendId, f64>,
    pub excluded_backends: Vec<BackendId>,
    pub total_duration: Duration,
    pub stages: Vec<StageRecord>,
    pub exclusions: Vec<ExclusionEvent>,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl EvaluationOutcome {
    /// `Some(passed)` when the metric was configured with a threshold.
    pub fn passed(&self) -> Option<bool> {
        self.metadata.get("passed").and_then(serde_json::Value::as_bool)
    }
}
