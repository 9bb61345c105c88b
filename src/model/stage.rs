// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::model::{BackendId, BackendResult, Embedding};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Inference,
    Embedding,
    Compute,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageKind::Inference => "inference",
            StageKind::Embedding => "embedding",
            StageKind::Compute => "compute",
        };
        f.write_str(name)
    }
}

/// What a backend produced for one stage.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutput {
    Structured(serde_json::Value),
    Embeddings(Vec<Embedding>),
    /// Outputs of a cross-product stage, in sub-unit order
    Batch(Vec<StageOutput>),
}

impl StageOutput {
    pub fn as_structured(&self) -> Option<&serde_json::Value> {
        match self {
            StageOutput::Structured(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_embeddings(&self) -> Option<&[Embedding]> {
        match self {
            StageOutput::Embeddings(vectors) => Some(vectors),
            _ => None,
        }
    }

    pub fn as_batch(&self) -> Option<&[StageOutput]> {
        match self {
            StageOutput::Batch(outputs) => Some(outputs),
            _ => None,
        }
    }
}

/// Announced to observers before a stage's calls are launched.
#[derive(Debug, Clone, PartialEq)]
pub struct StageStart {
    pub metric_name: String,
    pub stage_name: String,
    pub stage_index: usize,
    pub total_stages: usize,
    pub stage_kind: StageKind,
    pub active_backends: Vec<BackendId>,
}

/// Everything that happened during one pipeline stage.
#[derive(Debug, Clone)]
pub struct StageRecord {
    pub stage_name: String,
    pub stage_index: usize,
    pub total_stages: usize,
    pub stage_kind: StageKind,
    pub request_text: String,
    /// One result per backend that was active when the stage started, in
    /// active-set order
    pub results: Vec<BackendResult<StageOutput>>,
}

impl StageRecord {
    pub fn succeeded(&self) -> impl Iterator<Item = &BackendResult<StageOutput>> {
        self.results.iter().filter(|r| r.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &BackendResult<StageOutput>> {
        self.results.iter().filter(|r| !r.is_success())
    }

    pub fn backend_ids(&self) -> impl Iterator<Item = &BackendId> {
        self.results.iter().map(|r| &r.backend_id)
    }

    pub fn contains(&self, backend_id: &BackendId) -> bool {
        self.backend_ids().any(|id| id == backend_id)
    }

    /// Outputs of the backends that succeeded, keyed by backend.
    pub fn successful_outputs(&self) -> BTreeMap<BackendId, StageOutput> {
        self.results
            .iter()
            .filter_map(|r| r.value().map(|v| (r.backend_id.clone(), v.clone())))
            .collect()
    }
}
