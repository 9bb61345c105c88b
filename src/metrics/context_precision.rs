// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;

use crate::errors::MetricError;
use crate::metrics::{binary_verdict, structured};
use crate::model::{BackendId, InferenceRequest, ResponseShape, Sample, StageOutput, WorkUnit};
use crate::traits::{Metric, StagePlan};

/// Were the useful retrieved contexts ranked first?
///
/// Every backend judges every context in one cross-product stage. A backend's
/// score is the average precision of its verdicts in retrieval order. The
/// reference is the ground truth when present, otherwise the response.
pub struct ContextPrecision;

impl ContextPrecision {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ContextPrecision {
    fn default() -> Self {
        Self::new()
    }
}

/// Average precision of binary relevance verdicts; 0 when none are relevant.
pub fn average_precision(verdicts: &[f64]) -> f64 {
    let relevant: f64 = verdicts.iter().sum();
    if relevant <= 0.0 {
        return 0.0;
    }

    let mut hits = 0.0;
    let mut weighted = 0.0;
    for (rank, verdict) in verdicts.iter().enumerate() {
        hits += verdict;
        weighted += (hits / (rank + 1) as f64) * verdict;
    }
    weighted / relevant
}

impl Metric for ContextPrecision {
    fn name(&self) -> &str {
        "context_precision"
    }

    fn stage_count(&self) -> usize {
        1
    }

    fn validate(&self, sample: &Sample) -> Result<(), MetricError> {
        sample.user_input()?;
        if sample.reference.is_none() {
            sample.response()?;
        }
        if sample.retrieved_contexts.is_empty() {
            return Err(MetricError::MissingField("retrieved_contexts"));
        }
        Ok(())
    }

    fn plan_stage(
        &self,
        stage_index: usize,
        sample: &Sample,
        _previous: &BTreeMap<BackendId, StageOutput>,
    ) -> Result<StagePlan, MetricError> {
        if stage_index != 0 {
            return Err(MetricError::StageOutOfRange(stage_index));
        }

        let question = sample.user_input()?;
        let answer = match &sample.reference {
            Some(reference) => reference.as_str(),
            None => sample.response()?,
        };
        let units = sample
            .retrieved_contexts
            .iter()
            .map(|context| {
                WorkUnit::Inference(InferenceRequest::new(
                    format!(
                        "Was the context useful in arriving at the answer? Give a reason and a verdict of 1 (useful) or 0.\n\nQuestion: {question}\nContext: {context}\nAnswer: {answer}\n"
                    ),
                    ResponseShape::new("ContextVerdict").field("reason").field("verdict"),
                ))
            })
            .collect();

        Ok(StagePlan::cross_product("context_precision", units))
    }

    fn score(&self, _sample: &Sample, output: &StageOutput) -> Result<f64, MetricError> {
        let batch = output
            .as_batch()
            .ok_or_else(|| MetricError::Malformed("expected one verdict per context".into()))?;
        let verdicts = batch
            .iter()
            .map(|item| binary_verdict(structured(item)?, "verdict"))
            .collect::<Result<Vec<f64>, MetricError>>()?;
        Ok(average_precision(&verdicts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::StageWork;
    use serde_json::json;

    #[test]
    fn test_average_precision() {
        assert_eq!(average_precision(&[1.0, 1.0, 1.0]), 1.0);
        assert_eq!(average_precision(&[0.0, 0.0]), 0.0);
        // relevant at ranks 1 and 3: (1/1 + 2/3) / 2
        assert!((average_precision(&[1.0, 0.0, 1.0]) - 0.8333).abs() < 0.001);
        // relevant only at rank 2
        assert_eq!(average_precision(&[0.0, 1.0]), 0.5);
    }

    #[test]
    fn test_one_unit_per_context() {
        let sample = Sample {
            user_input: Some("Who wrote Dune?".into()),
            response: Some("Frank Herbert".into()),
            retrieved_contexts: vec!["Dune is a 1965 novel by Frank Herbert.".into(), "Sand is coarse.".into()],
            ..Sample::default()
        };

        let plan = ContextPrecision::new().plan_stage(0, &sample, &BTreeMap::new()).unwrap();
        let StageWork::CrossProduct(units) = plan.work else {
            panic!("expected a cross-product stage");
        };
        assert_eq!(units.len(), 2);
        assert!(units[1].describe().contains("Sand is coarse."));
    }

    #[test]
    fn test_score_from_batch() {
        let output = StageOutput::Batch(vec![
            StageOutput::Structured(json!({"reason": "", "verdict": 0})),
            StageOutput::Structured(json!({"reason": "", "verdict": 1})),
        ]);
        assert_eq!(ContextPrecision::new().score(&Sample::default(), &output), Ok(0.5));
    }

    #[test]
    fn test_contexts_required() {
        let sample = Sample {
            user_input: Some("q".into()),
            response: Some("a".into()),
            ..Sample::default()
        };
        assert_eq!(
            ContextPrecision::new().validate(&sample),
            Err(MetricError::MissingField("retrieved_contexts"))
        );
    }
}
