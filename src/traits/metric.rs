// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;

use crate::errors::MetricError;
use crate::model::{BackendId, Sample, StageKind, StageOutput, WorkUnit};

/// What a stage sends to the backends that are still active.
#[derive(Debug, Clone)]
pub enum StageWork {
    /// The same unit for every active backend
    Broadcast(WorkUnit),
    /// A distinct unit per backend; active backends without an entry fail the stage
    PerBackend(BTreeMap<BackendId, WorkUnit>),
    /// Every active backend × every unit, joined as one stage. A backend
    /// passes only if all of its units succeed.
    CrossProduct(Vec<WorkUnit>),
    /// No backend call; [`Metric::compute`] runs on each backend's previous output
    Compute,
}

/// One planned stage.
#[derive(Debug, Clone)]
pub struct StagePlan {
    pub name: String,
    pub work: StageWork,
}

impl StagePlan {
    pub fn broadcast(name: impl Into<String>, unit: WorkUnit) -> Self {
        Self {
            name: name.into(),
            work: StageWork::Broadcast(unit),
        }
    }

    pub fn per_backend(name: impl Into<String>, units: BTreeMap<BackendId, WorkUnit>) -> Self {
        Self {
            name: name.into(),
            work: StageWork::PerBackend(units),
        }
    }

    pub fn cross_product(name: impl Into<String>, units: Vec<WorkUnit>) -> Self {
        Self {
            name: name.into(),
            work: StageWork::CrossProduct(units),
        }
    }

    pub fn compute(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            work: StageWork::Compute,
        }
    }

    pub fn kind(&self) -> StageKind {
        match &self.work {
            StageWork::Broadcast(unit) => unit.kind(),
            StageWork::PerBackend(units) => units
                .values()
                .next()
                .map(WorkUnit::kind)
                .unwrap_or(StageKind::Inference),
            StageWork::CrossProduct(units) => units
                .first()
                .map(WorkUnit::kind)
                .unwrap_or(StageKind::Inference),
            StageWork::Compute => StageKind::Compute,
        }
    }

    pub fn request_text(&self) -> String {
        match &self.work {
            StageWork::Broadcast(unit) => unit.describe(),
            StageWork::PerBackend(units) => units
                .iter()
                .map(|(id, unit)| format!("[{}] {}", id, unit.describe()))
                .collect::<Vec<_>>()
                .join("\n"),
            StageWork::CrossProduct(units) => WorkUnit::Batch(units.clone()).describe(),
            StageWork::Compute => self.name.clone(),
        }
    }
}

/// Metric-specific glue: stage prompts and the final per-backend score.
///
/// Fan-out, exclusion, aggregation and notification are supplied by
/// [`crate::engine::MetricPipeline`]; a metric only describes its stages.
pub trait Metric: Send + Sync {
    fn name(&self) -> &str;

    fn stage_count(&self) -> usize;

    /// Reject samples that lack required material before anything runs.
    fn validate(&self, _sample: &Sample) -> Result<(), MetricError> {
        Ok(())
    }

    /// Plan stage `stage_index`. `previous` holds the previous stage's output
    /// of every backend still active (empty for the first stage).
    fn plan_stage(
        &self,
        stage_index: usize,
        sample: &Sample,
        previous: &BTreeMap<BackendId, StageOutput>,
    ) -> Result<StagePlan, MetricError>;

    /// Pure per-backend step for [`StageWork::Compute`] stages.
    fn compute(
        &self,
        stage_index: usize,
        _sample: &Sample,
        _previous: &StageOutput,
    ) -> Result<StageOutput, MetricError> {
        Err(MetricError::NotComputeStage(stage_index))
    }

    /// Turn one backend's final output into a scalar.
    fn score(&self, sample: &Sample, output: &StageOutput) -> Result<f64, MetricError>;
}
