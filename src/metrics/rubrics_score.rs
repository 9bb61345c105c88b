// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;

use crate::errors::MetricError;
use crate::metrics::structured;
use crate::model::{BackendId, InferenceRequest, ResponseShape, Sample, StageOutput, WorkUnit};
use crate::traits::{Metric, StagePlan};

const MIN_GRADE: f64 = 1.0;
const MAX_GRADE: f64 = 5.0;

fn default_rubrics() -> BTreeMap<String, String> {
    [
        ("score1_description", "The response is entirely incorrect or irrelevant."),
        ("score2_description", "The response is mostly incorrect, with a few relevant parts."),
        ("score3_description", "The response is partially correct but misses key points."),
        ("score4_description", "The response is mostly correct with minor omissions."),
        ("score5_description", "The response is fully correct and complete."),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Grades an answer from 1 to 5 against a rubric and maps the grade to [0, 1].
///
/// Rubrics on the sample take precedence over the metric's own.
pub struct RubricsScore {
    rubrics: BTreeMap<String, String>,
}

impl RubricsScore {
    pub fn new() -> Self {
        Self::with_rubrics(default_rubrics())
    }

    pub fn with_rubrics(rubrics: BTreeMap<String, String>) -> Self {
        Self { rubrics }
    }
}

impl Default for RubricsScore {
    fn default() -> Self {
        Self::new()
    }
}

impl Metric for RubricsScore {
    fn name(&self) -> &str {
        "rubrics_score"
    }

    fn stage_count(&self) -> usize {
        1
    }

    fn validate(&self, sample: &Sample) -> Result<(), MetricError> {
        sample.response().map(|_| ())
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

        let rubrics = if sample.rubrics.is_empty() {
            &self.rubrics
        } else {
            &sample.rubrics
        };
        let rubric_lines: Vec<String> = rubrics.iter().map(|(k, v)| format!("{k}: {v}")).collect();

        let mut prompt = String::from(
            "Grade the response from 1 to 5 using the rubric. Return feedback and an integer score.\n\nRubric:\n",
        );
        prompt.push_str(&rubric_lines.join("\n"));
        prompt.push('\n');
        if let Some(user_input) = &sample.user_input {
            prompt.push_str(&format!("User input: {user_input}\n"));
        }
        prompt.push_str(&format!("Response: {}\n", sample.response()?));
        if let Some(reference) = &sample.reference {
            prompt.push_str(&format!("Reference: {reference}\n"));
        }

        Ok(StagePlan::broadcast(
            "rubrics_score",
            WorkUnit::Inference(InferenceRequest::new(
                prompt,
                ResponseShape::new("RubricGrade").field("feedback").field("score"),
            )),
        ))
    }

    fn score(&self, _sample: &Sample, output: &StageOutput) -> Result<f64, MetricError> {
        let grade = structured(output)?["score"]
            .as_f64()
            .ok_or_else(|| MetricError::Malformed("'score' must be a number".into()))?;

        if !(MIN_GRADE..=MAX_GRADE).contains(&grade) {
            return Err(MetricError::Malformed(format!("grade {grade} outside 1-5")));
        }
        Ok((grade - MIN_GRADE) / (MAX_GRADE - MIN_GRADE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::StageWork;
    use serde_json::json;

    #[test]
    fn test_grade_is_normalised() {
        let metric = RubricsScore::new();
        let sample = Sample::default();
        let grade = |score| StageOutput::Structured(json!({"feedback": "", "score": score}));

        assert_eq!(metric.score(&sample, &grade(1)), Ok(0.0));
        assert_eq!(metric.score(&sample, &grade(4)), Ok(0.75));
        assert_eq!(metric.score(&sample, &grade(5)), Ok(1.0));
        assert!(metric.score(&sample, &grade(9)).is_err());
    }

    #[test]
    fn test_sample_rubrics_take_precedence() {
        let metric = RubricsScore::new();
        let sample = Sample {
            response: Some("42".into()),
            rubrics: [("score1_description".to_string(), "Wrong number".to_string())]
                .into_iter()
                .collect(),
            ..Sample::default()
        };

        let plan = metric.plan_stage(0, &sample, &BTreeMap::new()).unwrap();
        let StageWork::Broadcast(WorkUnit::Inference(request)) = plan.work else {
            panic!("expected a broadcast inference stage");
        };
        assert!(request.prompt.contains("Wrong number"));
        assert!(!request.prompt.contains("entirely incorrect"));
    }
}
