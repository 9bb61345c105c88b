// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Metric glue.
//!
//! Each metric only builds its stage prompts and turns one backend's final
//! output into a scalar; fan-out, exclusion, aggregation and notification
//! come from [`crate::engine::MetricPipeline`].
//!
//! | Metric | Stages | Score |
//! |--------|--------|-------|
//! | [`AspectCritic`] | one verdict | 0 or 1 |
//! | [`RubricsScore`] | one rubric grade | grade 1-5 mapped to [0, 1] |
//! | [`GoalAccuracy`] | goal extraction, then per-backend comparison | 0 or 1 |
//! | [`ContextPrecision`] | backend × context verdicts as one stage | average precision |
//! | [`AnswerSimilarity`] | embedding, then cosine compute | cosine similarity |

mod answer_similarity;
mod aspect_critic;
mod context_precision;
mod goal_accuracy;
mod rubrics_score;

pub use answer_similarity::AnswerSimilarity;
pub use aspect_critic::AspectCritic;
pub use context_precision::ContextPrecision;
pub use goal_accuracy::GoalAccuracy;
pub use rubrics_score::RubricsScore;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::errors::MetricError;
use crate::model::{MetricConfig, StageOutput};
use crate::traits::Metric;

/// Factory for creating metric instances from configuration
pub struct MetricFactory;

impl MetricFactory {
    /// Create a metric from its configured name and options
    ///
    /// - `aspect_critic` -> [`AspectCritic`] (requires a `definition` option)
    /// - `rubrics_score` -> [`RubricsScore`] (optional `rubrics` map)
    /// - `goal_accuracy` -> [`GoalAccuracy`] (optional `with_reference` flag)
    /// - `context_precision` -> [`ContextPrecision`]
    /// - `answer_similarity` -> [`AnswerSimilarity`]
    pub fn create(name: &str, config: &MetricConfig) -> Result<Arc<dyn Metric>, MetricError> {
        let options = &config.options;
        match name {
            "aspect_critic" => {
                let definition = string_option(options, "definition")?
                    .ok_or_else(|| invalid_option("definition", "is required"))?;
                let critic_name = string_option(options, "name")?.unwrap_or_else(|| name.to_string());
                Ok(Arc::new(AspectCritic::new(critic_name, definition)))
            }
            "rubrics_score" => {
                let metric = match options.get("rubrics") {
                    Some(value) => {
                        let rubrics: BTreeMap<String, String> = serde_json::from_value(value.clone())
                            .map_err(|e| invalid_option("rubrics", &e.to_string()))?;
                        RubricsScore::with_rubrics(rubrics)
                    }
                    None => RubricsScore::new(),
                };
                Ok(Arc::new(metric))
            }
            "goal_accuracy" => {
                let with_reference = match options.get("with_reference") {
                    Some(value) => value
                        .as_bool()
                        .ok_or_else(|| invalid_option("with_reference", "must be a boolean"))?,
                    None => false,
                };
                Ok(Arc::new(GoalAccuracy::new(with_reference)))
            }
            "context_precision" => Ok(Arc::new(ContextPrecision::new())),
            "answer_similarity" => Ok(Arc::new(AnswerSimilarity::new())),
            _ => Err(MetricError::UnknownMetric(name.to_string())),
        }
    }

    /// List all metric names the factory understands
    pub fn list_available_metrics() -> Vec<&'static str> {
        vec![
            "aspect_critic",
            "rubrics_score",
            "goal_accuracy",
            "context_precision",
            "answer_similarity",
        ]
    }

    pub fn is_available(name: &str) -> bool {
        Self::list_available_metrics().contains(&name)
    }
}

fn invalid_option(option: &str, reason: &str) -> MetricError {
    MetricError::InvalidOption {
        option: option.to_string(),
        reason: reason.to_string(),
    }
}

fn string_option(options: &BTreeMap<String, Value>, key: &str) -> Result<Option<String>, MetricError> {
    match options.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(invalid_option(key, "must be a string")),
    }
}

/// The structured object of a stage output.
pub(crate) fn structured(output: &StageOutput) -> Result<&Value, MetricError> {
    output
        .as_structured()
        .ok_or_else(|| MetricError::Malformed("expected a structured response".into()))
}

/// A 0/1 verdict field; booleans are accepted too.
pub(crate) fn binary_verdict(value: &Value, field: &str) -> Result<f64, MetricError> {
    match &value[field] {
        Value::Bool(true) => Ok(1.0),
        Value::Bool(false) => Ok(0.0),
        Value::Number(n) => match n.as_f64() {
            Some(v) if v == 0.0 || v == 1.0 => Ok(v),
            _ => Err(MetricError::Malformed(format!("'{field}' must be 0 or 1, got {n}"))),
        },
        other => Err(MetricError::Malformed(format!("'{field}' must be 0 or 1, got {other}"))),
    }
}

/// A text field of a structured response.
pub(crate) fn text_field<'a>(value: &'a Value, field: &str) -> Result<&'a str, MetricError> {
    value[field]
        .as_str()
        .ok_or_else(|| MetricError::Malformed(format!("'{field}' must be a string")))
}
