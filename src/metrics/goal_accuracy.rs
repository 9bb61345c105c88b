// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;

use crate::errors::MetricError;
use crate::metrics::{binary_verdict, structured, text_field};
use crate::model::{BackendId, InferenceRequest, ResponseShape, Sample, StageOutput, WorkUnit};
use crate::traits::{Metric, StagePlan};

/// Did the conversation reach the user's goal?
///
/// Stage 0 asks every backend to extract the user's goal and the end state
/// the conversation reached. Stage 1 asks each backend to compare *its own*
/// extracted end state against the desired outcome: the reference when
/// `with_reference` is set, otherwise the goal that backend extracted. A
/// backend whose extraction cannot be read gets no stage 1 work and is
/// excluded there.
pub struct GoalAccuracy {
    with_reference: bool,
}

impl GoalAccuracy {
    pub fn new(with_reference: bool) -> Self {
        Self { with_reference }
    }

    fn extraction(&self, sample: &Sample) -> Result<WorkUnit, MetricError> {
        let mut prompt = String::from(
            "Read the conversation. State the user's goal and the end state the conversation reached.\n\n",
        );
        prompt.push_str(&format!("User: {}\n", sample.user_input()?));
        prompt.push_str(&format!("Assistant: {}\n", sample.response()?));

        Ok(WorkUnit::Inference(InferenceRequest::new(
            prompt,
            ResponseShape::new("WorkflowOutput").field("user_goal").field("end_state"),
        )))
    }

    fn comparison(&self, sample: &Sample, extracted: &StageOutput) -> Result<WorkUnit, MetricError> {
        let extracted = structured(extracted)?;
        let end_state = text_field(extracted, "end_state")?;
        let desired = if self.with_reference {
            sample.reference()?
        } else {
            text_field(extracted, "user_goal")?
        };

        let prompt = format!(
            "Compare the achieved outcome with the desired outcome. Answer with a reason and a verdict of 1 if they match, otherwise 0.\n\nDesired outcome: {desired}\nAchieved outcome: {end_state}\n"
        );
        Ok(WorkUnit::Inference(InferenceRequest::new(
            prompt,
            ResponseShape::new("CompareOutcome").field("reason").field("verdict"),
        )))
    }
}

impl Metric for GoalAccuracy {
    fn name(&self) -> &str {
        if self.with_reference {
            "goal_accuracy_with_reference"
        } else {
            "goal_accuracy"
        }
    }

    fn stage_count(&self) -> usize {
        2
    }

    fn validate(&self, sample: &Sample) -> Result<(), MetricError> {
        sample.user_input()?;
        sample.response()?;
        if self.with_reference {
            sample.reference()?;
        }
        Ok(())
    }

    fn plan_stage(
        &self,
        stage_index: usize,
        sample: &Sample,
        previous: &BTreeMap<BackendId, StageOutput>,
    ) -> Result<StagePlan, MetricError> {
        match stage_index {
            0 => Ok(StagePlan::broadcast("infer_goal_outcome", self.extraction(sample)?)),
            1 => {
                let units = previous
                    .iter()
                    .filter_map(|(id, output)| {
                        self.comparison(sample, output)
                            .ok()
                            .map(|unit| (id.clone(), unit))
                    })
                    .collect();
                Ok(StagePlan::per_backend("compare_outcome", units))
            }
            _ => Err(MetricError::StageOutOfRange(stage_index)),
        }
    }

    fn score(&self, _sample: &Sample, output: &StageOutput) -> Result<f64, MetricError> {
        binary_verdict(structured(output)?, "verdict")
    }
}
