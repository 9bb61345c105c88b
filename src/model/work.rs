// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::BackendError;
use crate::model::StageKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One embedding vector.
pub type Embedding = Vec<f32>;

/// Identifier of one scoring backend.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendId(String);

impl BackendId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BackendId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for BackendId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// The structured response a stage expects back from a backend.
///
/// Only presence of top-level fields is checked; interpreting values is the
/// metric's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseShape {
    pub name: String,
    pub required_fields: Vec<String>,
}

impl ResponseShape {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required_fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.required_fields.push(field.into());
        self
    }

    /// Check a response against this shape.
    pub fn validate(&self, value: &serde_json::Value) -> Result<(), BackendError> {
        let object = value.as_object().ok_or_else(|| BackendError::NotStructured {
            shape: self.name.clone(),
        })?;

        let missing: Vec<String> = self
            .required_fields
            .iter()
            .filter(|field| !object.contains_key(field.as_str()))
            .cloned()
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(BackendError::ShapeMismatch {
                shape: self.name.clone(),
                missing,
            })
        }
    }
}

/// A structured inference request: a prompt plus the shape of the answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub prompt: String,
    pub expected: ResponseShape,
}

impl InferenceRequest {
    pub fn new(prompt: impl Into<String>, expected: ResponseShape) -> Self {
        Self {
            prompt: prompt.into(),
            expected,
        }
    }
}

/// One unit of work handed to a backend (or, for compute stages, run in-process).
#[derive(Debug, Clone, PartialEq)]
pub enum WorkUnit {
    Inference(InferenceRequest),
    Embedding { texts: Vec<String> },
    Compute { description: String },
    /// Several units for the same backend joined as one stage slot
    Batch(Vec<WorkUnit>),
}

impl WorkUnit {
    pub fn kind(&self) -> StageKind {
        match self {
            WorkUnit::Inference(_) => StageKind::Inference,
            WorkUnit::Embedding { .. } => StageKind::Embedding,
            WorkUnit::Compute { .. } => StageKind::Compute,
            WorkUnit::Batch(units) => units
                .first()
                .map(WorkUnit::kind)
                .unwrap_or(StageKind::Inference),
        }
    }

    /// Human-readable request text recorded on stage records.
    pub fn describe(&self) -> String {
        match self {
            WorkUnit::Inference(request) => request.prompt.clone(),
            WorkUnit::Embedding { texts } => texts.join("\n"),
            WorkUnit::Compute { description } => description.clone(),
            WorkUnit::Batch(units) => units
                .iter()
                .map(WorkUnit::describe)
                .collect::<Vec<_>>()
                .join("\n---\n"),
        }
    }
}
