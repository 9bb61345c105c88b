// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::BackendId;

/// Reduces per-backend scores into one evaluation-level scalar.
///
/// Implementations must depend on the scores only, never on stage history.
/// `None` means there was nothing to aggregate.
pub trait Aggregator: Send + Sync {
    fn aggregate(&self, scores: &BTreeMap<BackendId, f64>) -> Option<f64>;

    fn name(&self) -> &str;
}

/// Built-in reducers selectable from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    #[default]
    Mean,
    Median,
    Min,
    Max,
}

impl Aggregator for AggregationMode {
    fn aggregate(&self, scores: &BTreeMap<BackendId, f64>) -> Option<f64> {
        if scores.is_empty() {
            return None;
        }

        // BTreeMap iterates in key order, so the result does not depend on
        // the order backends were listed in
        let values = scores.values().copied();
        let aggregated = match self {
            AggregationMode::Mean => values.sum::<f64>() / scores.len() as f64,
            AggregationMode::Min => values.fold(f64::INFINITY, f64::min),
            AggregationMode::Max => values.fold(f64::NEG_INFINITY, f64::max),
            AggregationMode::Median => {
                let mut sorted: Vec<f64> = values.collect();
                sorted.sort_by(f64::total_cmp);
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    (sorted[mid - 1] + sorted[mid]) / 2.0
                } else {
                    sorted[mid]
                }
            }
        };
        Some(aggregated)
    }

    fn name(&self) -> &str {
        match self {
            AggregationMode::Mean => "mean",
            AggregationMode::Median => "median",
            AggregationMode::Min => "min",
            AggregationMode::Max => "max",
        }
    }
}
