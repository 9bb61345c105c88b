// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use crate::errors::ObserverError;
use crate::model::{EvaluationContext, EvaluationOutcome, ExclusionEvent, StageRecord, StageStart};
use crate::observability::messages::observer::HookReceived;
use crate::observability::messages::StructuredLog;
use crate::traits::EvaluationObserver;

const NAME: &str = "tracing";

/// Emits a `debug!` event for every lifecycle hook.
///
/// Keeps no state, so every evaluation shares the one instance.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl TracingObserver {
    pub fn new() -> Self {
        Self
    }

    fn emit(&self, hook: &str, detail: &str) -> Result<(), ObserverError> {
        HookReceived {
            observer: NAME,
            hook,
            detail,
        }
        .log();
        Ok(())
    }
}

impl EvaluationObserver for TracingObserver {
    fn for_evaluation(self: Arc<Self>) -> Arc<dyn EvaluationObserver> {
        self
    }

    fn name(&self) -> &str {
        NAME
    }

    fn before_evaluation(&self, context: &EvaluationContext) -> Result<(), ObserverError> {
        let detail = format!(
            "evaluation #{} of '{}' on {} backends from thread {}",
            context.evaluation_id,
            context.metric_name,
            context.backend_ids.len(),
            context.caller_thread.as_deref().unwrap_or("<unnamed>")
        );
        self.emit("before_evaluation", &detail)
    }

    fn after_evaluation(&self, outcome: &EvaluationOutcome) -> Result<(), ObserverError> {
        let detail = format!(
            "evaluation #{} of '{}' scored {:.4}",
            outcome.evaluation_id, outcome.metric_name, outcome.aggregated_score
        );
        self.emit("after_evaluation", &detail)
    }

    fn before_stage(&self, stage: &StageStart) -> Result<(), ObserverError> {
        let detail = format!(
            "stage '{}' ({}/{}) on {} backends",
            stage.stage_name,
            stage.stage_index,
            stage.total_stages,
            stage.active_backends.len()
        );
        self.emit("before_stage", &detail)
    }

    fn after_stage(&self, record: &StageRecord) -> Result<(), ObserverError> {
        let detail = format!(
            "stage '{}': {} succeeded, {} failed",
            record.stage_name,
            record.succeeded().count(),
            record.failed().count()
        );
        self.emit("after_stage", &detail)
    }

    fn on_backend_excluded(&self, event: &ExclusionEvent) -> Result<(), ObserverError> {
        let detail = format!(
            "backend '{}' excluded at stage '{}'",
            event.backend_id, event.failed_stage_name
        );
        self.emit("on_backend_excluded", &detail)
    }
}
