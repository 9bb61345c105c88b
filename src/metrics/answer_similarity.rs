// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;

use serde_json::json;

use crate::errors::MetricError;
use crate::metrics::structured;
use crate::model::{BackendId, Sample, StageOutput, WorkUnit};
use crate::traits::{Metric, StagePlan};

/// Semantic similarity of response and reference.
///
/// Stage 0 embeds both texts on every backend; stage 1 is a compute stage
/// that turns each backend's pair of vectors into a cosine similarity.
pub struct AnswerSimilarity;

impl AnswerSimilarity {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AnswerSimilarity {
    fn default() -> Self {
        Self::new()
    }
}

/// Cosine similarity in [-1, 1]; 0 when either vector has no magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64, MetricError> {
    if a.len() != b.len() {
        return Err(MetricError::Malformed(format!(
            "embedding dimensions differ: {} vs {}",
            a.len(),
            b.len()
        )));
    }

    let dot: f64 = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    let norm_a: f64 = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();

    if norm_a < 1e-9 || norm_b < 1e-9 {
        return Ok(0.0);
    }
    Ok((dot / (norm_a * norm_b)).clamp(-1.0, 1.0))
}

impl Metric for AnswerSimilarity {
    fn name(&self) -> &str {
        "answer_similarity"
    }

    fn stage_count(&self) -> usize {
        2
    }

    fn validate(&self, sample: &Sample) -> Result<(), MetricError> {
        sample.response()?;
        sample.reference()?;
        Ok(())
    }

    fn plan_stage(
        &self,
        stage_index: usize,
        sample: &Sample,
        _previous: &BTreeMap<BackendId, StageOutput>,
    ) -> Result<StagePlan, MetricError> {
        match stage_index {
            0 => Ok(StagePlan::broadcast(
                "embed_answers",
                WorkUnit::Embedding {
                    texts: vec![sample.response()?.to_string(), sample.reference()?.to_string()],
                },
            )),
            1 => Ok(StagePlan::compute("cosine_similarity")),
            _ => Err(MetricError::StageOutOfRange(stage_index)),
        }
    }

    fn compute(
        &self,
        stage_index: usize,
        _sample: &Sample,
        previous: &StageOutput,
    ) -> Result<StageOutput, MetricError> {
        if stage_index != 1 {
            return Err(MetricError::NotComputeStage(stage_index));
        }
        let vectors = previous
            .as_embeddings()
            .ok_or_else(|| MetricError::Malformed("expected embeddings".into()))?;
        let [response, reference, ..] = vectors else {
            return Err(MetricError::Malformed(format!("expected 2 embeddings, got {}", vectors.len())));
        };

        let similarity = cosine_similarity(response, reference)?;
        Ok(StageOutput::Structured(json!({ "similarity": similarity })))
    }

    fn score(&self, _sample: &Sample, output: &StageOutput) -> Result<f64, MetricError> {
        structured(output)?["similarity"]
            .as_f64()
            .ok_or_else(|| MetricError::Malformed("'similarity' must be a number".into()))
    }
}
