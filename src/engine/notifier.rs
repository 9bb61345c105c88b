// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::errors::ObserverError;
use crate::model::{EvaluationContext, EvaluationOutcome, ExclusionEvent, StageRecord, StageStart};
use crate::observability::messages::observer::{ObserverHookFailed, ObserverHookPanicked};
use crate::observability::messages::StructuredLog;
use crate::traits::EvaluationObserver;

/// Delivers lifecycle events to the observers of one evaluation.
///
/// Built once per evaluation from the shared observers via
/// [`EvaluationObserver::for_evaluation`]; the shared instances themselves
/// are never notified. Every hook call is isolated: an `Err` or a panic from
/// one observer is logged and the remaining observers still run.
pub struct Notifier {
    observers: Vec<Arc<dyn EvaluationObserver>>,
}

impl Notifier {
    pub fn for_evaluation(shared: &[Arc<dyn EvaluationObserver>]) -> Self {
        let mut observers = Vec::with_capacity(shared.len());
        for observer in shared {
            let factory = Arc::clone(observer);
            match panic::catch_unwind(AssertUnwindSafe(move || factory.for_evaluation())) {
                Ok(scoped) => observers.push(scoped),
                Err(payload) => ObserverHookPanicked {
                    observer: observer.name(),
                    hook: "for_evaluation",
                    message: &panic_message(payload.as_ref()),
                }
                .log(),
            }
        }
        Self { observers }
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn before_evaluation(&self, context: &EvaluationContext) {
        self.dispatch("before_evaluation", |o| o.before_evaluation(context));
    }

    pub fn after_evaluation(&self, outcome: &EvaluationOutcome) {
        self.dispatch("after_evaluation", |o| o.after_evaluation(outcome));
    }

    pub fn before_stage(&self, stage: &StageStart) {
        self.dispatch("before_stage", |o| o.before_stage(stage));
    }

    pub fn after_stage(&self, record: &StageRecord) {
        self.dispatch("after_stage", |o| o.after_stage(record));
    }

    pub fn backend_excluded(&self, event: &ExclusionEvent) {
        self.dispatch("on_backend_excluded", |o| o.on_backend_excluded(event));
    }

    fn dispatch<F>(&self, hook: &'static str, notify: F)
    where
        F: Fn(&dyn EvaluationObserver) -> Result<(), ObserverError>,
    {
        for observer in &self.observers {
            let observer = observer.as_ref();
            match panic::catch_unwind(AssertUnwindSafe(|| notify(observer))) {
                Ok(Ok(())) => {}
                Ok(Err(error)) => ObserverHookFailed {
                    observer: observer.name(),
                    hook,
                    error: &error,
                }
                .log(),
                Err(payload) => ObserverHookPanicked {
                    observer: observer.name(),
                    hook,
                    message: &panic_message(payload.as_ref()),
                }
                .log(),
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
