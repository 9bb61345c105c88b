// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::MetricError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One answer to be judged, with whatever surrounding material metrics need.
///
/// # Example
/// ```yaml
/// user_input: "Book a table for two at 7pm"
/// response: "Your table for two is booked for 7pm."
/// reference: "Table booked for two people at 19:00"
/// retrieved_contexts:
///   - "The restaurant accepts bookings until 21:00."
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    #[serde(default)]
    pub user_input: Option<String>,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub retrieved_contexts: Vec<String>,
    /// Rubric descriptions keyed by score label, e.g. `score1_description`
    #[serde(default)]
    pub rubrics: BTreeMap<String, String>,
}

impl Sample {
    pub fn user_input(&self) -> Result<&str, MetricError> {
        self.user_input
            .as_deref()
            .ok_or(MetricError::MissingField("user_input"))
    }

    pub fn response(&self) -> Result<&str, MetricError> {
        self.response
            .as_deref()
            .ok_or(MetricError::MissingField("response"))
    }

    pub fn reference(&self) -> Result<&str, MetricError> {
        self.reference
            .as_deref()
            .ok_or(MetricError::MissingField("reference"))
    }
}
