// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::engine::aggregation::Aggregator;
use crate::engine::executor::FanOutExecutor;
use crate::engine::ledger::ExclusionLedger;
use crate::engine::notifier::Notifier;
use crate::errors::{BackendError, EvaluationError};
use crate::model::{
    BackendId, BackendResult, EvaluationContext, EvaluationOutcome, ExclusionEvent, MetricConfig, Sample,
    StageOutput, StageRecord, StageStart, WorkUnit,
};
use crate::observability::messages::evaluation::{
    BackendExcluded, EvaluationCompleted, EvaluationFailed, EvaluationStarted, StageCompleted, StageStarted,
};
use crate::observability::messages::StructuredLog;
use crate::traits::{EvaluationObserver, Metric, StagePlan, StageWork};

/// Runs metrics over samples against a set of backends.
///
/// Every evaluation follows the same template:
///
/// 1. resolve the backend set and reject empty sets, empty pipelines and
///    samples the metric cannot use (no notification is sent for these);
/// 2. `before_evaluation` on the calling thread;
/// 3. for each stage: plan, `before_stage`, fan out to the active backends,
///    join, `after_stage`, then exclude every backend that did not succeed
///    (`on_backend_excluded` per exclusion). A stage with no success ends
///    the evaluation with [`EvaluationError::AllBackendsFailed`];
/// 4. score each survivor's final output, aggregate, `after_evaluation`.
///
/// `after_evaluation` is only sent on success. Observers that opened
/// something earlier close it when their per-evaluation instance is dropped.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use the_jury::engine::{FanOutExecutor, MetricPipeline, WorkerPool};
/// use the_jury::metrics::AspectCritic;
/// use the_jury::model::{MetricConfig, Sample};
/// use the_jury::traits::{BackendMap, Metric};
///
/// # fn run(backends: BackendMap, sample: Sample) -> Result<(), Box<dyn std::error::Error>> {
/// let pool = Arc::new(WorkerPool::new(4, 8)?);
/// let pipeline = MetricPipeline::new(FanOutExecutor::new(Arc::clone(&pool), backends));
/// let metric: Arc<dyn Metric> = Arc::new(AspectCritic::new("harmfulness", "Is the answer harmful?"));
///
/// let score = pipeline.evaluate_blocking(metric, Arc::new(MetricConfig::default()), Arc::new(sample))?;
/// println!("score: {score:.3}");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MetricPipeline {
    executor: FanOutExecutor,
    observers: Vec<Arc<dyn EvaluationObserver>>,
    aggregator: Option<Arc<dyn Aggregator>>,
    parent_source: Option<ParentSource>,
    next_id: Arc<AtomicU64>,
}

/// Reads the caller's ambient report parent. Called on the thread that
/// starts each evaluation.
pub type ParentSource = Arc<dyn Fn() -> Option<String> + Send + Sync>;

/// Everything decided before the first stage runs.
struct Prepared {
    metric: Arc<dyn Metric>,
    context: EvaluationContext,
    notifier: Notifier,
}

impl MetricPipeline {
    pub fn new(executor: FanOutExecutor) -> Self {
        Self {
            executor,
            observers: Vec::new(),
            aggregator: None,
            parent_source: None,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn EvaluationObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Replace the configured [`crate::engine::AggregationMode`] for every
    /// evaluation run through this pipeline.
    pub fn with_aggregator(mut self, aggregator: Arc<dyn Aggregator>) -> Self {
        self.aggregator = Some(aggregator);
        self
    }

    /// Capture [`EvaluationContext::parent`] from `source` when each
    /// evaluation starts.
    pub fn with_parent_source(mut self, source: ParentSource) -> Self {
        self.parent_source = Some(source);
        self
    }

    pub fn executor(&self) -> &FanOutExecutor {
        &self.executor
    }

    pub async fn evaluate(
        &self,
        metric: Arc<dyn Metric>,
        config: Arc<MetricConfig>,
        sample: Arc<Sample>,
    ) -> Result<f64, EvaluationError> {
        self.evaluate_detailed(metric, config, sample)
            .await
            .map(|outcome| outcome.aggregated_score)
    }

    pub async fn evaluate_detailed(
        &self,
        metric: Arc<dyn Metric>,
        config: Arc<MetricConfig>,
        sample: Arc<Sample>,
    ) -> Result<EvaluationOutcome, EvaluationError> {
        let prepared = self.prepare(metric, config, sample)?;
        self.run(prepared).await
    }

    /// Start an evaluation as one background task on the worker pool.
    ///
    /// `before_evaluation` runs here, on the calling thread; every later
    /// notification runs on a pool worker.
    pub fn evaluate_deferred(
        &self,
        metric: Arc<dyn Metric>,
        config: Arc<MetricConfig>,
        sample: Arc<Sample>,
    ) -> EvaluationHandle<f64> {
        let metric_name = metric.name().to_string();
        match self.prepare(metric, config, sample) {
            Ok(prepared) => {
                let pipeline = self.clone();
                let task = self.executor.defer(async move {
                    pipeline.run(prepared).await.map(|outcome| outcome.aggregated_score)
                });
                EvaluationHandle::running(metric_name, task)
            }
            Err(error) => EvaluationHandle::failed(metric_name, error),
        }
    }

    /// Like [`MetricPipeline::evaluate_deferred`], resolving to the full outcome.
    pub fn evaluate_deferred_detailed(
        &self,
        metric: Arc<dyn Metric>,
        config: Arc<MetricConfig>,
        sample: Arc<Sample>,
    ) -> EvaluationHandle<EvaluationOutcome> {
        let metric_name = metric.name().to_string();
        match self.prepare(metric, config, sample) {
            Ok(prepared) => {
                let pipeline = self.clone();
                let task = self.executor.defer(async move { pipeline.run(prepared).await });
                EvaluationHandle::running(metric_name, task)
            }
            Err(error) => EvaluationHandle::failed(metric_name, error),
        }
    }

    /// Evaluate from synchronous code. Must not be called from inside an
    /// async context.
    pub fn evaluate_blocking(
        &self,
        metric: Arc<dyn Metric>,
        config: Arc<MetricConfig>,
        sample: Arc<Sample>,
    ) -> Result<f64, EvaluationError> {
        let handle = self.evaluate_deferred(metric, config, sample);
        self.executor.pool().block_on(handle)
    }

    fn prepare(
        &self,
        metric: Arc<dyn Metric>,
        config: Arc<MetricConfig>,
        sample: Arc<Sample>,
    ) -> Result<Prepared, EvaluationError> {
        let evaluation_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let metric_name = metric.name().to_string();

        let checked = self.check(metric.as_ref(), &config, &sample);
        let backend_ids = match checked {
            Ok(backend_ids) => backend_ids,
            Err(error) => {
                EvaluationFailed {
                    evaluation_id,
                    metric: &metric_name,
                    error: &error,
                }
                .log();
                return Err(error);
            }
        };

        let context = EvaluationContext {
            evaluation_id,
            metric_name,
            sample,
            config,
            backend_ids,
            total_stages: metric.stage_count(),
            caller_thread: std::thread::current().name().map(str::to_string),
            parent: self.parent_source.as_ref().and_then(|source| source()),
            started_at: Instant::now(),
        };

        EvaluationStarted {
            evaluation_id,
            metric: &context.metric_name,
            backend_count: context.backend_ids.len(),
            total_stages: context.total_stages,
        }
        .log();

        let notifier = Notifier::for_evaluation(&self.observers);
        notifier.before_evaluation(&context);

        Ok(Prepared {
            metric,
            context,
            notifier,
        })
    }

    /// Pre-flight checks; returns the backend set on success.
    fn check(
        &self,
        metric: &dyn Metric,
        config: &MetricConfig,
        sample: &Sample,
    ) -> Result<Vec<BackendId>, EvaluationError> {
        let metric_name = metric.name().to_string();

        if self.executor.pool().is_shut_down() {
            return Err(EvaluationError::PoolShutdown);
        }
        if metric.stage_count() == 0 {
            return Err(EvaluationError::EmptyPipeline { metric: metric_name });
        }

        let backend_ids = self.resolve_backends(config);
        if backend_ids.is_empty() {
            return Err(EvaluationError::NoBackends { metric: metric_name });
        }

        metric
            .validate(sample)
            .map_err(|source| EvaluationError::InvalidSample {
                metric: metric_name,
                source,
            })?;

        Ok(backend_ids)
    }

    /// The config's backend subset in listed order (duplicates dropped), or
    /// every registered backend when the subset is empty.
    fn resolve_backends(&self, config: &MetricConfig) -> Vec<BackendId> {
        if config.backends.is_empty() {
            return self.executor.backends().keys().cloned().collect();
        }

        let mut backend_ids: Vec<BackendId> = Vec::with_capacity(config.backends.len());
        for id in &config.backends {
            if !backend_ids.contains(id) {
                backend_ids.push(id.clone());
            }
        }
        backend_ids
    }

    async fn run(&self, prepared: Prepared) -> Result<EvaluationOutcome, EvaluationError> {
        let span = EvaluationStarted {
            evaluation_id: prepared.context.evaluation_id,
            metric: &prepared.context.metric_name,
            backend_count: prepared.context.backend_ids.len(),
            total_stages: prepared.context.total_stages,
        }
        .span("metric_pipeline");

        let evaluation_id = prepared.context.evaluation_id;
        let metric_name = prepared.context.metric_name.clone();

        let result = self.run_stages(prepared).instrument(span).await;
        if let Err(error) = &result {
            EvaluationFailed {
                evaluation_id,
                metric: &metric_name,
                error,
            }
            .log();
        }
        result
    }

    async fn run_stages(&self, prepared: Prepared) -> Result<EvaluationOutcome, EvaluationError> {
        let Prepared {
            metric,
            context,
            notifier,
        } = prepared;
        let sample = context.sample.as_ref();
        let total_stages = context.total_stages;

        let mut ledger = ExclusionLedger::new(context.backend_ids.clone());
        let mut stages: Vec<StageRecord> = Vec::with_capacity(total_stages);
        let mut previous: BTreeMap<BackendId, StageOutput> = BTreeMap::new();

        for stage_index in 0..total_stages {
            let plan = metric
                .plan_stage(stage_index, sample, &previous)
                .map_err(|source| EvaluationError::StagePlanning {
                    metric: context.metric_name.clone(),
                    stage_index,
                    source,
                })?;

            let active = ledger.active().to_vec();
            let start = StageStart {
                metric_name: context.metric_name.clone(),
                stage_name: plan.name.clone(),
                stage_index,
                total_stages,
                stage_kind: plan.kind(),
                active_backends: active.clone(),
            };
            StageStarted {
                metric: &context.metric_name,
                stage: &plan.name,
                stage_index,
                total_stages,
                kind: &start.stage_kind.to_string(),
                active_backends: active.len(),
            }
            .log();
            notifier.before_stage(&start);

            let results = self
                .run_stage(metric.as_ref(), stage_index, sample, &plan, &active, &previous)
                .await;

            let record = StageRecord {
                stage_name: plan.name.clone(),
                stage_index,
                total_stages,
                stage_kind: start.stage_kind,
                request_text: plan.request_text(),
                results,
            };
            StageCompleted {
                metric: &context.metric_name,
                stage: &record.stage_name,
                stage_index,
                succeeded: record.succeeded().count(),
                failed: record.failed().count(),
            }
            .log();
            notifier.after_stage(&record);

            for event in ledger.record_stage(&record) {
                announce_exclusion(&notifier, &event);
            }

            previous = record.successful_outputs();
            stages.push(record);

            if previous.is_empty() {
                return Err(EvaluationError::AllBackendsFailed {
                    metric: context.metric_name.clone(),
                    stage_name: plan.name,
                    stage_index,
                });
            }
        }

        let (last_stage_name, last_stage_index) = stages
            .last()
            .map(|record| (record.stage_name.clone(), record.stage_index))
            .unwrap_or_default();

        let mut per_backend_scores: BTreeMap<BackendId, f64> = BTreeMap::new();
        for (backend_id, output) in &previous {
            let scored = metric
                .score(sample, output)
                .map_err(|e| BackendError::Compute(e.to_string()))
                .and_then(|score| {
                    if score.is_finite() {
                        Ok(score)
                    } else {
                        Err(BackendError::Compute(format!("non-finite score {score}")))
                    }
                });

            match scored {
                Ok(score) => {
                    per_backend_scores.insert(backend_id.clone(), score);
                }
                Err(error) => {
                    let excluded =
                        ledger.exclude(backend_id, &last_stage_name, last_stage_index, Some(error.to_string()));
                    if let Some(event) = excluded {
                        announce_exclusion(&notifier, &event);
                    }
                }
            }
        }

        let all_failed = || EvaluationError::AllBackendsFailed {
            metric: context.metric_name.clone(),
            stage_name: last_stage_name.clone(),
            stage_index: last_stage_index,
        };
        let aggregated_score = match &self.aggregator {
            Some(aggregator) => aggregator.aggregate(&per_backend_scores),
            None => context.config.aggregation.aggregate(&per_backend_scores),
        }
        .ok_or_else(all_failed)?;

        let mut metadata = BTreeMap::new();
        let aggregator_name = match &self.aggregator {
            Some(aggregator) => aggregator.name().to_string(),
            None => context.config.aggregation.name().to_string(),
        };
        metadata.insert("aggregation".to_string(), serde_json::Value::from(aggregator_name));
        if let Some(threshold) = context.config.threshold {
            metadata.insert("threshold".to_string(), serde_json::Value::from(threshold));
            metadata.insert(
                "passed".to_string(),
                serde_json::Value::from(aggregated_score >= threshold),
            );
        }

        let outcome = EvaluationOutcome {
            evaluation_id: context.evaluation_id,
            metric_name: context.metric_name.clone(),
            aggregated_score,
            excluded_backends: ledger.excluded(),
            per_backend_scores,
            total_duration: context.started_at.elapsed(),
            stages,
            exclusions: ledger.events().to_vec(),
            metadata,
        };

        EvaluationCompleted {
            evaluation_id: outcome.evaluation_id,
            metric: &outcome.metric_name,
            score: outcome.aggregated_score,
            scored_backends: outcome.per_backend_scores.len(),
            excluded_backends: outcome.excluded_backends.len(),
            duration: outcome.total_duration,
        }
        .log();
        notifier.after_evaluation(&outcome);

        Ok(outcome)
    }

    /// One result per active backend, in active order.
    async fn run_stage(
        &self,
        metric: &dyn Metric,
        stage_index: usize,
        sample: &Sample,
        plan: &StagePlan,
        active: &[BackendId],
        previous: &BTreeMap<BackendId, StageOutput>,
    ) -> Vec<BackendResult<StageOutput>> {
        match &plan.work {
            StageWork::Broadcast(unit) => self.executor.broadcast(active, unit.clone()).await,
            StageWork::CrossProduct(units) => self.executor.cross_product(active, units.clone()).await,
            StageWork::PerBackend(units) => {
                let assignments = active
                    .iter()
                    .filter_map(|id| units.get(id).map(|unit| (id.clone(), Arc::new(unit.clone()))))
                    .collect();
                let mut dispatched = self.executor.dispatch(assignments).await.into_iter();

                let mut results = Vec::with_capacity(active.len());
                for id in active {
                    let planned = if units.contains_key(id) { dispatched.next() } else { None };
                    let result = planned.unwrap_or_else(|| {
                        BackendResult::failure(
                            id.clone(),
                            BackendError::NoWorkPlanned(id.clone()),
                            Duration::ZERO,
                            Arc::new(WorkUnit::Compute {
                                description: plan.name.clone(),
                            }),
                        )
                    });
                    results.push(result);
                }
                results
            }
            StageWork::Compute => {
                let request = Arc::new(WorkUnit::Compute {
                    description: plan.name.clone(),
                });
                active
                    .iter()
                    .map(|id| {
                        let start = Instant::now();
                        let computed = match previous.get(id) {
                            Some(input) => compute_isolated(metric, stage_index, sample, input),
                            None => Err(BackendError::Compute("no output from the previous stage".into())),
                        };
                        BackendResult::from_result(id.clone(), computed, start.elapsed(), Arc::clone(&request))
                    })
                    .collect()
            }
        }
    }
}

fn announce_exclusion(notifier: &Notifier, event: &ExclusionEvent) {
    BackendExcluded {
        backend_id: event.backend_id.as_str(),
        stage: &event.failed_stage_name,
        stage_index: event.failed_stage_index,
        cause: event.cause.as_deref(),
    }
    .log();
    notifier.backend_excluded(event);
}

/// Run a compute step so that a panic fails only this backend.
fn compute_isolated(
    metric: &dyn Metric,
    stage_index: usize,
    sample: &Sample,
    input: &StageOutput,
) -> Result<StageOutput, BackendError> {
    match panic::catch_unwind(AssertUnwindSafe(|| metric.compute(stage_index, sample, input))) {
        Ok(computed) => computed.map_err(|e| BackendError::Compute(e.to_string())),
        Err(_) => Err(BackendError::Panicked(format!(
            "compute step of stage {stage_index} panicked"
        ))),
    }
}

enum HandleState<T> {
    Failed(Option<EvaluationError>),
    Running(JoinHandle<Result<T, EvaluationError>>),
}

/// Future of a deferred evaluation.
///
/// Resolves to the same `Result` as the direct call. A task that panicked
/// or was cancelled resolves to [`EvaluationError::Deferred`].
pub struct EvaluationHandle<T> {
    metric: String,
    state: HandleState<T>,
}

impl<T> EvaluationHandle<T> {
    fn running(metric: String, task: JoinHandle<Result<T, EvaluationError>>) -> Self {
        Self {
            metric,
            state: HandleState::Running(task),
        }
    }

    fn failed(metric: String, error: EvaluationError) -> Self {
        Self {
            metric,
            state: HandleState::Failed(Some(error)),
        }
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    pub fn is_finished(&self) -> bool {
        match &self.state {
            HandleState::Failed(_) => true,
            HandleState::Running(task) => task.is_finished(),
        }
    }
}

impl<T> Future for EvaluationHandle<T> {
    type Output = Result<T, EvaluationError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &mut this.state {
            HandleState::Failed(error) => match error.take() {
                Some(error) => Poll::Ready(Err(error)),
                None => Poll::Ready(Err(EvaluationError::Deferred {
                    metric: this.metric.clone(),
                    reason: "handle polled after completion".to_string(),
                })),
            },
            HandleState::Running(task) => match Pin::new(task).poll(cx) {
                Poll::Pending => Poll::Pending,
                Poll::Ready(Ok(result)) => Poll::Ready(result),
                Poll::Ready(Err(join_error)) => Poll::Ready(Err(EvaluationError::Deferred {
                    metric: this.metric.clone(),
                    reason: join_error.to_string(),
                })),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::ScriptedBackend;
    use crate::config::BackendMap;
    use crate::engine::{AggregationMode, WorkerPool};
    use crate::errors::MetricError;
    use crate::model::{InferenceRequest, ResponseShape};
    use crate::traits::ScoringBackend;
    use serde_json::json;
    use tokio::runtime::Handle;

    /// Single-stage metric scoring `verdict` as-is.
    struct Verdict;

    impl Metric for Verdict {
        fn name(&self) -> &str {
            "verdict"
        }

        fn stage_count(&self) -> usize {
            1
        }

        fn plan_stage(
            &self,
            _stage_index: usize,
            sample: &Sample,
            _previous: &BTreeMap<BackendId, StageOutput>,
        ) -> Result<StagePlan, MetricError> {
            Ok(StagePlan::broadcast(
                "verdict",
                WorkUnit::Inference(InferenceRequest::new(
                    sample.response()?,
                    ResponseShape::new("Verdict").field("verdict"),
                )),
            ))
        }

        fn score(&self, _sample: &Sample, output: &StageOutput) -> Result<f64, MetricError> {
            output
                .as_structured()
                .and_then(|v| v["verdict"].as_f64())
                .ok_or_else(|| MetricError::Malformed("verdict is not a number".into()))
        }
    }

    struct NoStages;

    impl Metric for NoStages {
        fn name(&self) -> &str {
            "no_stages"
        }

        fn stage_count(&self) -> usize {
            0
        }

        fn plan_stage(
            &self,
            stage_index: usize,
            _sample: &Sample,
            _previous: &BTreeMap<BackendId, StageOutput>,
        ) -> Result<StagePlan, MetricError> {
            Err(MetricError::StageOutOfRange(stage_index))
        }

        fn score(&self, _sample: &Sample, _output: &StageOutput) -> Result<f64, MetricError> {
            Ok(0.0)
        }
    }

    fn pipeline_with(backends: Vec<ScriptedBackend>) -> MetricPipeline {
        let mut map = BackendMap::new();
        for backend in backends {
            map.insert(backend.name().into(), Arc::new(backend));
        }
        let pool = Arc::new(WorkerPool::with_handle(Handle::current(), 4));
        MetricPipeline::new(FanOutExecutor::new(pool, map))
    }

    fn sample() -> Arc<Sample> {
        Arc::new(Sample {
            response: Some("The capital of France is Paris.".into()),
            ..Sample::default()
        })
    }

    #[tokio::test]
    async fn test_scores_are_aggregated_with_configured_mode() {
        let pipeline = pipeline_with(vec![
            ScriptedBackend::new("a").respond(json!({"verdict": 1.0})),
            ScriptedBackend::new("b").respond(json!({"verdict": 0.0})),
            ScriptedBackend::new("c").respond(json!({"verdict": 0.5})),
        ]);

        let config = Arc::new(MetricConfig::default().with_aggregation(AggregationMode::Max));
        let outcome = pipeline
            .evaluate_detailed(Arc::new(Verdict), config, sample())
            .await
            .unwrap();

        assert_eq!(outcome.aggregated_score, 1.0);
        assert_eq!(outcome.per_backend_scores.len(), 3);
        assert_eq!(outcome.metadata["aggregation"], json!("max"));
        assert_eq!(outcome.passed(), None);
    }

    #[tokio::test]
    async fn test_threshold_records_pass_state() {
        let pipeline = pipeline_with(vec![
            ScriptedBackend::new("a").respond(json!({"verdict": 1.0})),
            ScriptedBackend::new("b").respond(json!({"verdict": 0.0})),
        ]);

        let config = Arc::new(MetricConfig::default().with_threshold(0.6));
        let outcome = pipeline
            .evaluate_detailed(Arc::new(Verdict), config, sample())
            .await
            .unwrap();

        assert_eq!(outcome.passed(), Some(false));
    }

    #[tokio::test]
    async fn test_unscorable_output_excludes_backend_at_last_stage() {
        let pipeline = pipeline_with(vec![
            ScriptedBackend::new("a").respond(json!({"verdict": 1.0})),
            ScriptedBackend::new("b").respond(json!({"verdict": "yes"})),
        ]);

        let outcome = pipeline
            .evaluate_detailed(Arc::new(Verdict), Arc::new(MetricConfig::default()), sample())
            .await
            .unwrap();

        assert_eq!(outcome.aggregated_score, 1.0);
        assert_eq!(outcome.excluded_backends, vec![BackendId::from("b")]);
        assert_eq!(outcome.exclusions[0].failed_stage_index, 0);
        assert!(!outcome.per_backend_scores.contains_key(&BackendId::from("b")));
    }

    #[tokio::test]
    async fn test_config_subset_limits_backends() {
        let pipeline = pipeline_with(vec![
            ScriptedBackend::new("a").respond(json!({"verdict": 1.0})),
            ScriptedBackend::new("b").respond(json!({"verdict": 0.0})),
        ]);

        let config = Arc::new(MetricConfig::default().with_backends(["b"]));
        let outcome = pipeline
            .evaluate_detailed(Arc::new(Verdict), config, sample())
            .await
            .unwrap();

        assert_eq!(outcome.aggregated_score, 0.0);
        assert_eq!(outcome.stages[0].results.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_backend_in_subset_is_excluded() {
        let pipeline = pipeline_with(vec![ScriptedBackend::new("a").respond(json!({"verdict": 1.0}))]);

        let config = Arc::new(MetricConfig::default().with_backends(["a", "ghost"]));
        let outcome = pipeline
            .evaluate_detailed(Arc::new(Verdict), config, sample())
            .await
            .unwrap();

        assert_eq!(outcome.excluded_backends, vec![BackendId::from("ghost")]);
    }

    #[tokio::test]
    async fn test_preflight_errors() {
        let pipeline = pipeline_with(vec![]);
        let result = pipeline
            .evaluate(Arc::new(Verdict), Arc::new(MetricConfig::default()), sample())
            .await;
        assert_eq!(result, Err(EvaluationError::NoBackends { metric: "verdict".into() }));

        let pipeline = pipeline_with(vec![ScriptedBackend::new("a").respond(json!({"verdict": 1.0}))]);
        let result = pipeline
            .evaluate(Arc::new(NoStages), Arc::new(MetricConfig::default()), sample())
            .await;
        assert_eq!(result, Err(EvaluationError::EmptyPipeline { metric: "no_stages".into() }));

        let result = pipeline
            .evaluate(Arc::new(Verdict), Arc::new(MetricConfig::default()), Arc::new(Sample::default()))
            .await;
        assert!(matches!(result, Err(EvaluationError::StagePlanning { stage_index: 0, .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_deferred_evaluation_resolves_to_score() {
        let pipeline = pipeline_with(vec![
            ScriptedBackend::new("a").respond(json!({"verdict": 1.0})),
            ScriptedBackend::new("b").respond(json!({"verdict": 0.0})),
        ]);

        let handle = pipeline.evaluate_deferred(Arc::new(Verdict), Arc::new(MetricConfig::default()), sample());
        assert_eq!(handle.metric(), "verdict");
        assert_eq!(handle.await, Ok(0.5));
    }

    #[tokio::test]
    async fn test_deferred_preflight_failure_resolves_immediately() {
        let pipeline = pipeline_with(vec![]);
        let handle = pipeline.evaluate_deferred(Arc::new(Verdict), Arc::new(MetricConfig::default()), sample());

        assert!(handle.is_finished());
        assert!(matches!(handle.await, Err(EvaluationError::NoBackends { .. })));
    }

    #[tokio::test]
    async fn test_evaluation_after_shutdown_is_rejected() {
        let pipeline = pipeline_with(vec![ScriptedBackend::new("a").respond(json!({"verdict": 1.0}))]);
        pipeline.executor().pool().shutdown().await;

        let result = pipeline
            .evaluate(Arc::new(Verdict), Arc::new(MetricConfig::default()), sample())
            .await;
        assert_eq!(result, Err(EvaluationError::PoolShutdown));
    }

    #[test]
    fn test_blocking_evaluation_on_owned_pool() {
        let pool = Arc::new(WorkerPool::new(2, 2).unwrap());
        let mut map = BackendMap::new();
        map.insert(
            "a".into(),
            Arc::new(ScriptedBackend::new("a").respond(json!({"verdict": 0.25}))),
        );
        let pipeline = MetricPipeline::new(FanOutExecutor::new(Arc::clone(&pool), map));

        let score = pipeline
            .evaluate_blocking(Arc::new(Verdict), Arc::new(MetricConfig::default()), sample())
            .unwrap();

        assert_eq!(score, 0.25);
        pool.shutdown_blocking(Duration::from_secs(1));
    }
}
