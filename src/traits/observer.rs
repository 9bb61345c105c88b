// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use crate::errors::ObserverError;
use crate::model::{EvaluationContext, EvaluationOutcome, ExclusionEvent, StageRecord, StageStart};

/// Receives lifecycle notifications for evaluations.
///
/// A shared observer is never notified directly. At the start of every
/// evaluation the pipeline calls [`EvaluationObserver::for_evaluation`] and
/// notifies the returned instance only. Stateless observers return
/// themselves; observers that pair an opening and a closing notification
/// return a fresh instance so concurrent evaluations cannot share
/// bookkeeping.
///
/// `before_evaluation` runs on the thread that started the evaluation. Every
/// later hook may run on a pool worker thread, so anything read from
/// thread-bound state must be captured in `before_evaluation` and kept on the
/// instance.
///
/// Errors and panics from hooks are logged and discarded by the notifier.
pub trait EvaluationObserver: Send + Sync {
    fn for_evaluation(self: Arc<Self>) -> Arc<dyn EvaluationObserver>;

    fn name(&self) -> &str;

    fn before_evaluation(&self, _context: &EvaluationContext) -> Result<(), ObserverError> {
        Ok(())
    }

    /// Only sent when the evaluation produced an outcome.
    fn after_evaluation(&self, _outcome: &EvaluationOutcome) -> Result<(), ObserverError> {
        Ok(())
    }

    fn before_stage(&self, _stage: &StageStart) -> Result<(), ObserverError> {
        Ok(())
    }

    fn after_stage(&self, _record: &StageRecord) -> Result<(), ObserverError> {
        Ok(())
    }

    fn on_backend_excluded(&self, _event: &ExclusionEvent) -> Result<(), ObserverError> {
        Ok(())
    }
}
