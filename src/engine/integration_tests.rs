// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! End-to-end tests of the pipeline with the shipped metrics, scripted
//! backends and observers.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::runtime::Handle;

use crate::backends::{InFlightProbe, ScriptedBackend};
use crate::config::BackendMap;
use crate::engine::{AggregationMode, FanOutExecutor, MetricPipeline, WorkerPool};
use crate::errors::{EvaluationError, ObserverError};
use crate::metrics::{AnswerSimilarity, AspectCritic, ContextPrecision, GoalAccuracy, RubricsScore};
use crate::model::{
    BackendId, EvaluationContext, EvaluationOutcome, ExclusionEvent, MetricConfig, Sample, StageRecord, StageStart,
};
use crate::observers::{Reporter, ReportingObserver, StepId};
use crate::traits::{EvaluationObserver, Metric, ScoringBackend};

#[cfg(test)]
mod tests {
    use super::*;

    /// Every field any shipped metric asks for.
    fn agreeable() -> Value {
        json!({
            "reason": "looks right",
            "verdict": 1,
            "feedback": "fine",
            "score": 5,
            "user_goal": "book a table for two",
            "end_state": "a table for two is booked",
        })
    }

    fn backend_map(backends: Vec<ScriptedBackend>) -> BackendMap {
        let mut map = BackendMap::new();
        for backend in backends {
            map.insert(backend.name().into(), Arc::new(backend));
        }
        map
    }

    fn pipeline_with(backends: Vec<ScriptedBackend>, max_concurrency: usize) -> MetricPipeline {
        let pool = Arc::new(WorkerPool::with_handle(Handle::current(), max_concurrency));
        MetricPipeline::new(FanOutExecutor::new(pool, backend_map(backends)))
    }

    fn sample() -> Arc<Sample> {
        Arc::new(Sample {
            user_input: Some("Book a table for two at 7pm".into()),
            response: Some("Your table for two is booked for 7pm.".into()),
            reference: Some("Table booked for two at 19:00".into()),
            retrieved_contexts: vec![
                "Bookings can be made until 21:00.".into(),
                "The restaurant opens at 17:00.".into(),
                "Parking is available nearby.".into(),
            ],
            ..Sample::default()
        })
    }

    fn critic() -> Arc<dyn Metric> {
        Arc::new(AspectCritic::new("correctness", "Does the response confirm the booking?"))
    }

    fn ids(names: &[&str]) -> Vec<BackendId> {
        names.iter().map(|n| BackendId::from(*n)).collect()
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Seen {
        BeforeEvaluation,
        BeforeStage(usize, Vec<BackendId>),
        AfterStage(usize, Vec<BackendId>),
        Excluded(BackendId, usize),
        AfterEvaluation,
    }

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<Seen>>,
    }

    impl Recording {
        fn seen(&self) -> Vec<Seen> {
            self.seen.lock().unwrap().clone()
        }

        fn push(&self, event: Seen) -> Result<(), ObserverError> {
            self.seen.lock().unwrap().push(event);
            Ok(())
        }
    }

    impl EvaluationObserver for Recording {
        fn for_evaluation(self: Arc<Self>) -> Arc<dyn EvaluationObserver> {
            self
        }

        fn name(&self) -> &str {
            "recording"
        }

        fn before_evaluation(&self, _context: &EvaluationContext) -> Result<(), ObserverError> {
            self.push(Seen::BeforeEvaluation)
        }

        fn after_evaluation(&self, _outcome: &EvaluationOutcome) -> Result<(), ObserverError> {
            self.push(Seen::AfterEvaluation)
        }

        fn before_stage(&self, stage: &StageStart) -> Result<(), ObserverError> {
            self.push(Seen::BeforeStage(stage.stage_index, stage.active_backends.clone()))
        }

        fn after_stage(&self, record: &StageRecord) -> Result<(), ObserverError> {
            self.push(Seen::AfterStage(record.stage_index, record.backend_ids().cloned().collect()))
        }

        fn on_backend_excluded(&self, event: &ExclusionEvent) -> Result<(), ObserverError> {
            self.push(Seen::Excluded(event.backend_id.clone(), event.failed_stage_index))
        }
    }

    /// Fails every hook, alternating between an error and a panic.
    #[derive(Default)]
    struct Hostile {
        calls: AtomicUsize,
    }

    impl Hostile {
        fn misbehave(&self) -> Result<(), ObserverError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
                Err(ObserverError::new("hostile", "refusing"))
            } else {
                panic!("hostile observer panicked")
            }
        }
    }

    impl EvaluationObserver for Hostile {
        fn for_evaluation(self: Arc<Self>) -> Arc<dyn EvaluationObserver> {
            self
        }

        fn name(&self) -> &str {
            "hostile"
        }

        fn before_evaluation(&self, _context: &EvaluationContext) -> Result<(), ObserverError> {
            self.misbehave()
        }

        fn after_evaluation(&self, _outcome: &EvaluationOutcome) -> Result<(), ObserverError> {
            self.misbehave()
        }

        fn before_stage(&self, _stage: &StageStart) -> Result<(), ObserverError> {
            self.misbehave()
        }

        fn after_stage(&self, _record: &StageRecord) -> Result<(), ObserverError> {
            self.misbehave()
        }

        fn on_backend_excluded(&self, _event: &ExclusionEvent) -> Result<(), ObserverError> {
            self.misbehave()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_two_of_three_judges_agree() {
        let pipeline = pipeline_with(
            vec![
                ScriptedBackend::new("judge-a").respond(json!({"reason": "ok", "verdict": 1})),
                ScriptedBackend::new("judge-b").respond(json!({"reason": "ok", "verdict": 1})),
                ScriptedBackend::new("judge-c").respond(json!({"reason": "no", "verdict": 0})),
            ],
            4,
        );

        let score = pipeline
            .evaluate(critic(), Arc::new(MetricConfig::default()), sample())
            .await
            .unwrap();

        assert!((score - 0.6667).abs() < 1e-4, "score was {score}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_stage_zero_failure_is_one_exclusion() {
        let recording = Arc::new(Recording::default());
        let pipeline = pipeline_with(
            vec![
                ScriptedBackend::new("backend-1").respond(agreeable()),
                ScriptedBackend::new("backend-2")
                    .fail_when("State the user's goal", "refused")
                    .respond(agreeable()),
                ScriptedBackend::new("backend-3").respond(agreeable()),
            ],
            4,
        )
        .with_observer(recording.clone());

        let outcome = pipeline
            .evaluate_detailed(
                Arc::new(GoalAccuracy::new(false)),
                Arc::new(MetricConfig::default()),
                sample(),
            )
            .await
            .unwrap();

        let failed = BackendId::from("backend-2");
        assert_eq!(outcome.exclusions.len(), 1);
        assert_eq!(outcome.exclusions[0].backend_id, failed);
        assert_eq!(outcome.exclusions[0].failed_stage_index, 0);
        assert!(outcome.exclusions[0].cause.as_deref().unwrap().contains("refused"));

        assert!(outcome.stages[0].contains(&failed));
        assert!(!outcome.stages[1].contains(&failed));
        assert!(!outcome.per_backend_scores.contains_key(&failed));

        let exclusions: Vec<Seen> = recording
            .seen()
            .into_iter()
            .filter(|s| matches!(s, Seen::Excluded(..)))
            .collect();
        assert_eq!(exclusions, vec![Seen::Excluded(failed, 0)]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_excluded_backends_never_return() {
        let recording = Arc::new(Recording::default());
        let pipeline = pipeline_with(
            vec![
                ScriptedBackend::new("a").respond(agreeable()),
                ScriptedBackend::new("b")
                    .fail_when("State the user's goal", "timeout")
                    .respond(agreeable()),
                // extraction passes the shape check but cannot be compared
                ScriptedBackend::new("c")
                    .respond_when(
                        "State the user's goal",
                        json!({"user_goal": 7, "end_state": "booked"}),
                    )
                    .respond(agreeable()),
                ScriptedBackend::new("d").respond(agreeable()),
            ],
            4,
        )
        .with_observer(recording.clone());

        let outcome = pipeline
            .evaluate_detailed(
                Arc::new(GoalAccuracy::new(false)),
                Arc::new(MetricConfig::default()),
                sample(),
            )
            .await
            .unwrap();

        let mut excluded = BTreeSet::new();
        for event in recording.seen() {
            match event {
                Seen::BeforeStage(_, active) => {
                    assert!(active.iter().all(|id| !excluded.contains(id)), "{active:?} vs {excluded:?}");
                }
                Seen::Excluded(id, _) => {
                    assert!(excluded.insert(id), "backend excluded twice");
                }
                _ => {}
            }
        }

        assert_eq!(excluded, ids(&["b", "c"]).into_iter().collect::<BTreeSet<_>>());
        assert_eq!(outcome.excluded_backends, ids(&["b", "c"]));
        assert_eq!(
            outcome.exclusions.iter().map(|e| e.failed_stage_index).collect::<Vec<_>>(),
            vec![0, 1]
        );
        for id in &outcome.excluded_backends {
            assert!(!outcome.per_backend_scores.contains_key(id));
        }
        assert_eq!(outcome.per_backend_scores.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_stage_with_no_success_yields_no_score() {
        let recording = Arc::new(Recording::default());
        let pipeline = pipeline_with(
            vec![
                ScriptedBackend::new("a").failing("HTTP 503"),
                ScriptedBackend::new("b").failing("HTTP 503"),
                ScriptedBackend::new("c").panicking(),
            ],
            4,
        )
        .with_observer(recording.clone());

        let result = pipeline
            .evaluate_detailed(critic(), Arc::new(MetricConfig::default()), sample())
            .await;

        assert_eq!(
            result.map(|o| o.aggregated_score),
            Err(EvaluationError::AllBackendsFailed {
                metric: "correctness".into(),
                stage_name: "single_turn_aspect_critic".into(),
                stage_index: 0,
            })
        );

        let seen = recording.seen();
        assert_eq!(seen.iter().filter(|s| matches!(s, Seen::Excluded(..))).count(), 3);
        assert!(!seen.contains(&Seen::AfterEvaluation));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_backend_order_does_not_change_scores() {
        let backends = || {
            vec![
                ScriptedBackend::new("a").respond(json!({"feedback": "", "score": 5})),
                ScriptedBackend::new("b").respond(json!({"feedback": "", "score": 2})),
                ScriptedBackend::new("c").respond(json!({"feedback": "", "score": 4})),
            ]
        };

        // Default aggregation first, then an explicit median
        let aggregations = [None, Some(AggregationMode::Median)];
        let mut finals = Vec::new();
        for aggregation in aggregations {
            let mut outcomes = Vec::new();
            for order in [["a", "b", "c"], ["c", "a", "b"], ["b", "c", "a"], ["c", "b", "a"]] {
                let pipeline = pipeline_with(backends(), 4);
                let mut config = MetricConfig::default().with_backends(order);
                if let Some(mode) = aggregation {
                    config = config.with_aggregation(mode);
                }
                outcomes.push(
                    pipeline
                        .evaluate_detailed(Arc::new(RubricsScore::new()), Arc::new(config), sample())
                        .await
                        .unwrap(),
                );
            }

            for outcome in &outcomes[1..] {
                assert_eq!(outcome.aggregated_score, outcomes[0].aggregated_score);
                assert_eq!(outcome.per_backend_scores, outcomes[0].per_backend_scores);
            }
            finals.push(outcomes[0].aggregated_score);
        }

        assert!((finals[0] - 2.0 / 3.0).abs() < 1e-9, "mean was {}", finals[0]);
        assert_eq!(finals[1], 0.75);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_results_keep_active_order_when_middle_backend_is_slowest() {
        let pipeline = pipeline_with(
            vec![
                ScriptedBackend::new("a").respond(agreeable()),
                ScriptedBackend::new("b")
                    .respond(agreeable())
                    .latency(Duration::from_millis(80)),
                ScriptedBackend::new("c").respond(agreeable()),
            ],
            4,
        );

        let outcome = pipeline
            .evaluate_detailed(
                critic(),
                Arc::new(MetricConfig::default().with_backends(["a", "b", "c"])),
                sample(),
            )
            .await
            .unwrap();

        let order: Vec<BackendId> = outcome.stages[0].backend_ids().cloned().collect();
        assert_eq!(order, ids(&["a", "b", "c"]));
        assert!(outcome.stages[0].results[1].duration() >= Duration::from_millis(80));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cross_product_respects_concurrency_limit() {
        let probe = InFlightProbe::default();
        let judge = |name: &str| {
            ScriptedBackend::new(name)
                .respond(json!({"reason": "", "verdict": 1}))
                .latency(Duration::from_millis(15))
                .probe(probe.clone())
        };
        let pipeline = pipeline_with(vec![judge("a"), judge("b"), judge("c"), judge("d")], 2);

        let outcome = pipeline
            .evaluate_detailed(Arc::new(ContextPrecision::new()), Arc::new(MetricConfig::default()), sample())
            .await
            .unwrap();

        assert_eq!(outcome.aggregated_score, 1.0);
        assert_eq!(outcome.stages.len(), 1);
        assert!(probe.peak() <= 2, "peak in-flight was {}", probe.peak());
        assert_eq!(probe.current(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_embedding_then_compute_stage() {
        let pipeline = pipeline_with(
            vec![
                ScriptedBackend::new("a"),
                ScriptedBackend::new("b").embeddings(vec![vec![1.0, 0.0], vec![0.0, 1.0]]),
                ScriptedBackend::new("c").fail_when("19:00", "embedding quota exceeded"),
            ],
            4,
        );

        let outcome = pipeline
            .evaluate_detailed(
                Arc::new(AnswerSimilarity::new()),
                Arc::new(MetricConfig::default().with_aggregation(AggregationMode::Min)),
                sample(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.stages.len(), 2);
        assert_eq!(outcome.per_backend_scores[&BackendId::from("b")], 0.0);
        assert!(outcome.per_backend_scores[&BackendId::from("a")] > 0.5);
        assert_eq!(outcome.aggregated_score, 0.0);
        assert_eq!(outcome.excluded_backends, ids(&["c"]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_misbehaving_observer_changes_nothing() {
        let backends = || {
            vec![
                ScriptedBackend::new("a").respond(agreeable()),
                ScriptedBackend::new("b").failing("down"),
            ]
        };

        let quiet = pipeline_with(backends(), 4)
            .evaluate_detailed(critic(), Arc::new(MetricConfig::default()), sample())
            .await
            .unwrap();

        let recording = Arc::new(Recording::default());
        let noisy = pipeline_with(backends(), 4)
            .with_observer(Arc::new(Hostile::default()))
            .with_observer(recording.clone())
            .evaluate_detailed(critic(), Arc::new(MetricConfig::default()), sample())
            .await
            .unwrap();

        assert_eq!(noisy.aggregated_score, quiet.aggregated_score);
        assert_eq!(noisy.excluded_backends, quiet.excluded_backends);
        assert_eq!(
            recording.seen(),
            vec![
                Seen::BeforeEvaluation,
                Seen::BeforeStage(0, ids(&["a", "b"])),
                Seen::AfterStage(0, ids(&["a", "b"])),
                Seen::Excluded(BackendId::from("b"), 0),
                Seen::AfterEvaluation,
            ]
        );
    }

    /// Step counts of a reporter whose write may fail or panic.
    #[derive(Default)]
    struct FlakyReporter {
        started: AtomicUsize,
        stopped: AtomicUsize,
        panic_on_write: bool,
    }

    impl Reporter for FlakyReporter {
        fn current_parent(&self) -> Option<String> {
            Some("suite".into())
        }

        fn start_step(&self, _parent: Option<&str>, _name: &str) -> Result<StepId, ObserverError> {
            Ok(StepId(self.started.fetch_add(1, Ordering::SeqCst) as u64))
        }

        fn write_result(&self, _step: StepId, _outcome: &EvaluationOutcome) -> Result<(), ObserverError> {
            if self.panic_on_write {
                panic!("report writer crashed");
            }
            Err(ObserverError::new("flaky", "attachment rejected"))
        }

        fn stop_step(&self, _step: StepId) {
            self.stopped.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_report_step_closed_once_when_write_fails() {
        for panic_on_write in [false, true] {
            let reporter = Arc::new(FlakyReporter {
                panic_on_write,
                ..FlakyReporter::default()
            });
            let pipeline = pipeline_with(vec![ScriptedBackend::new("a").respond(agreeable())], 2)
                .with_observer(Arc::new(ReportingObserver::new(Arc::clone(&reporter))));

            let score = pipeline
                .evaluate(critic(), Arc::new(MetricConfig::default()), sample())
                .await;

            assert_eq!(score, Ok(1.0));
            assert_eq!(reporter.started.load(Ordering::SeqCst), 1);
            assert_eq!(reporter.stopped.load(Ordering::SeqCst), 1);
        }
    }

    thread_local! {
        static CURRENT_NODE: RefCell<Option<String>> = const { RefCell::new(None) };
        static CURRENT_SUITE: RefCell<Option<String>> = const { RefCell::new(None) };
    }

    /// Reporter whose parent node is bound to the thread, like most test
    /// report frameworks.
    #[derive(Default)]
    struct ThreadBoundReporter {
        next: AtomicU64,
        steps: Mutex<Vec<(Option<String>, String, ThreadId)>>,
        stopped: AtomicUsize,
    }

    impl Reporter for ThreadBoundReporter {
        fn current_parent(&self) -> Option<String> {
            CURRENT_NODE.with(|node| node.borrow().clone())
        }

        fn start_step(&self, parent: Option<&str>, name: &str) -> Result<StepId, ObserverError> {
            self.steps
                .lock()
                .unwrap()
                .push((parent.map(str::to_string), name.to_string(), thread::current().id()));
            Ok(StepId(self.next.fetch_add(1, Ordering::SeqCst)))
        }

        fn write_result(&self, _step: StepId, _outcome: &EvaluationOutcome) -> Result<(), ObserverError> {
            Ok(())
        }

        fn stop_step(&self, _step: StepId) {
            self.stopped.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_deferred_evaluations_report_under_callers_parent() {
        let pool = Arc::new(WorkerPool::new(2, 4).unwrap());
        let backends = backend_map(vec![
            ScriptedBackend::new("a").respond(agreeable()),
            ScriptedBackend::new("b").respond(agreeable()),
        ]);
        let reporter = Arc::new(ThreadBoundReporter::default());
        let pipeline = MetricPipeline::new(FanOutExecutor::new(Arc::clone(&pool), backends))
            .with_observer(Arc::new(ReportingObserver::new(Arc::clone(&reporter))));

        CURRENT_NODE.with(|node| *node.borrow_mut() = Some("P".into()));
        let caller = thread::current().id();

        let metrics: Vec<Arc<dyn Metric>> = vec![
            Arc::new(GoalAccuracy::new(false)),
            Arc::new(AspectCritic::new("aspect_critic", "Is the booking confirmed?")),
            Arc::new(RubricsScore::new()),
        ];
        // one, then two, then three evaluations through the same shared observer
        for rounds in 1..=metrics.len() {
            for metric in &metrics[..rounds] {
                let handle =
                    pipeline.evaluate_deferred(Arc::clone(metric), Arc::new(MetricConfig::default()), sample());
                assert_eq!(pool.block_on(handle), Ok(1.0));
            }
        }

        let steps = reporter.steps.lock().unwrap().clone();
        let names: Vec<&str> = steps.iter().map(|(_, name, _)| name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "goal_accuracy",
                "goal_accuracy",
                "aspect_critic",
                "goal_accuracy",
                "aspect_critic",
                "rubrics_score",
            ]
        );
        for (parent, name, thread) in &steps {
            assert_eq!(parent.as_deref(), Some("P"), "{name} lost its parent");
            assert_ne!(*thread, caller, "{name} reported on the calling thread");
        }
        assert_eq!(reporter.stopped.load(Ordering::SeqCst), 6);

        pool.shutdown_blocking(Duration::from_secs(1));
    }

    #[test]
    fn test_pipeline_parent_source_is_read_on_calling_thread() {
        let pool = Arc::new(WorkerPool::new(2, 4).unwrap());
        let backends = backend_map(vec![ScriptedBackend::new("a").respond(agreeable())]);
        let reporter = Arc::new(ThreadBoundReporter::default());
        let pipeline = MetricPipeline::new(FanOutExecutor::new(Arc::clone(&pool), backends))
            .with_parent_source(Arc::new(|| CURRENT_SUITE.with(|suite| suite.borrow().clone())))
            .with_observer(Arc::new(ReportingObserver::new(Arc::clone(&reporter))));

        CURRENT_SUITE.with(|suite| *suite.borrow_mut() = Some("suite-1".into()));
        let first = pipeline.evaluate_deferred(critic(), Arc::new(MetricConfig::default()), sample());
        CURRENT_SUITE.with(|suite| *suite.borrow_mut() = Some("suite-2".into()));
        let second = pipeline.evaluate_deferred(critic(), Arc::new(MetricConfig::default()), sample());

        assert_eq!(pool.block_on(first), Ok(1.0));
        assert_eq!(pool.block_on(second), Ok(1.0));

        let mut parents: Vec<Option<String>> =
            reporter.steps.lock().unwrap().iter().map(|(parent, _, _)| parent.clone()).collect();
        parents.sort();
        assert_eq!(parents, vec![Some("suite-1".to_string()), Some("suite-2".to_string())]);

        pool.shutdown_blocking(Duration::from_secs(1));
    }
}
