// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;

use crate::errors::MetricError;
use crate::metrics::{binary_verdict, structured};
use crate::model::{BackendId, InferenceRequest, ResponseShape, Sample, StageOutput, WorkUnit};
use crate::traits::{Metric, StagePlan};

/// Binary judgment of an answer against one free-form criterion.
pub struct AspectCritic {
    name: String,
    definition: String,
}

impl AspectCritic {
    pub fn new(name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definition: definition.into(),
        }
    }

    fn prompt(&self, sample: &Sample) -> Result<String, MetricError> {
        let mut prompt = format!(
            "Evaluate the response against the criterion below. Answer with a reason and a verdict of 1 (criterion met) or 0 (not met).\n\nCriterion: {}\n",
            self.definition
        );
        if let Some(user_input) = &sample.user_input {
            prompt.push_str(&format!("User input: {user_input}\n"));
        }
        prompt.push_str(&format!("Response: {}\n", sample.response()?));
        if let Some(reference) = &sample.reference {
            prompt.push_str(&format!("Reference: {reference}\n"));
        }
        Ok(prompt)
    }
}

impl Metric for AspectCritic {
    fn name(&self) -> &str {
        &self.name
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
        Ok(StagePlan::broadcast(
            "single_turn_aspect_critic",
            WorkUnit::Inference(InferenceRequest::new(
                self.prompt(sample)?,
                ResponseShape::new("AspectCriticVerdict").field("reason").field("verdict"),
            )),
        ))
    }

    fn score(&self, _sample: &Sample, output: &StageOutput) -> Result<f64, MetricError> {
        binary_verdict(structured(output)?, "verdict")
    }
}
