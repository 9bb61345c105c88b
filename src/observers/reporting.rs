// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::errors::ObserverError;
use crate::model::{EvaluationContext, EvaluationOutcome};
use crate::traits::EvaluationObserver;

/// Identifier of an open report step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StepId(pub u64);

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step-{}", self.0)
    }
}

/// A hierarchical report that evaluation results are written into.
///
/// The "current parent" is whatever node the calling thread is reporting
/// under. It is usually thread-bound, so it is only meaningful on the thread
/// that started the evaluation.
pub trait Reporter: Send + Sync {
    fn current_parent(&self) -> Option<String>;

    fn start_step(&self, parent: Option<&str>, name: &str) -> Result<StepId, ObserverError>;

    fn write_result(&self, step: StepId, outcome: &EvaluationOutcome) -> Result<(), ObserverError>;

    fn stop_step(&self, step: StepId);
}

/// Writes every successful evaluation as one step of a [`Reporter`].
///
/// The parent node is captured in `before_evaluation`, on the calling
/// thread, from [`EvaluationContext::parent`] or else the reporter, and reused in `after_evaluation`, which usually runs on a pool
/// worker. Each evaluation gets its own instance so concurrent evaluations
/// never see each other's parent.
pub struct ReportingObserver<R: Reporter> {
    reporter: Arc<R>,
    parent: OnceLock<Option<String>>,
}

impl<R: Reporter> ReportingObserver<R> {
    pub fn new(reporter: Arc<R>) -> Self {
        Self {
            reporter,
            parent: OnceLock::new(),
        }
    }

    pub fn reporter(&self) -> &Arc<R> {
        &self.reporter
    }

    /// Parent captured by `before_evaluation`, if it ran.
    pub fn captured_parent(&self) -> Option<&str> {
        self.parent.get().and_then(|parent| parent.as_deref())
    }
}

/// Closes a step exactly once, however the write ends.
struct StepGuard<'a, R: Reporter> {
    reporter: &'a R,
    step: StepId,
}

impl<R: Reporter> Drop for StepGuard<'_, R> {
    fn drop(&mut self) {
        self.reporter.stop_step(self.step);
    }
}

impl<R: Reporter + 'static> EvaluationObserver for ReportingObserver<R> {
    fn for_evaluation(self: Arc<Self>) -> Arc<dyn EvaluationObserver> {
        Arc::new(Self::new(Arc::clone(&self.reporter)))
    }

    fn name(&self) -> &str {
        "reporting"
    }

    fn before_evaluation(&self, context: &EvaluationContext) -> Result<(), ObserverError> {
        let parent = context.parent.clone().or_else(|| self.reporter.current_parent());
        let _ = self.parent.set(parent);
        Ok(())
    }

    fn after_evaluation(&self, outcome: &EvaluationOutcome) -> Result<(), ObserverError> {
        let step = self
            .reporter
            .start_step(self.captured_parent(), &outcome.metric_name)?;
        let _guard = StepGuard {
            reporter: self.reporter.as_ref(),
            step,
        };
        self.reporter.write_result(step, outcome)
    }
}
