// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;
use std::time::Instant;

use crate::config::BackendMap;
use crate::errors::BackendError;
use crate::model::{BackendId, BackendResult, StageOutput, WorkUnit};
use crate::observability::messages::backend::{BackendCallCompleted, BackendCallFailed};
use crate::observability::messages::StructuredLog;
use crate::traits::ScoringBackend;

/// Invokes one backend with one unit of work.
///
/// `invoke` always returns a [`BackendResult`]: client errors, responses that
/// do not match the expected shape, short embedding batches and unknown
/// backend ids all become `Failure`. Panics are caught one level up, where
/// the executor joins the task running the call.
#[derive(Clone)]
pub struct BackendCall {
    backends: BackendMap,
}

impl BackendCall {
    pub fn new(backends: BackendMap) -> Self {
        Self { backends }
    }

    pub fn backends(&self) -> &BackendMap {
        &self.backends
    }

    pub async fn invoke(&self, backend_id: BackendId, work: Arc<WorkUnit>) -> BackendResult<StageOutput> {
        let start = Instant::now();
        let result = match self.backends.get(&backend_id) {
            Some(backend) => Self::run(backend.as_ref(), &work).await,
            None => Err(BackendError::UnknownBackend(backend_id.clone())),
        };
        let duration = start.elapsed();
        let kind = work.kind().to_string();

        match &result {
            Ok(_) => BackendCallCompleted {
                backend_id: backend_id.as_str(),
                kind: &kind,
                duration,
            }
            .log(),
            Err(error) => BackendCallFailed {
                backend_id: backend_id.as_str(),
                error,
                duration,
            }
            .log(),
        }

        BackendResult::from_result(backend_id, result, duration, work)
    }

    async fn run(backend: &dyn ScoringBackend, work: &WorkUnit) -> Result<StageOutput, BackendError> {
        match work {
            WorkUnit::Inference(request) => {
                let value = backend.complete(request).await?;
                request.expected.validate(&value)?;
                Ok(StageOutput::Structured(value))
            }
            WorkUnit::Embedding { texts } => {
                let vectors = backend.embed(texts).await?;
                if vectors.len() < texts.len() {
                    return Err(BackendError::InsufficientEmbeddings {
                        expected: texts.len(),
                        actual: vectors.len(),
                    });
                }
                Ok(StageOutput::Embeddings(vectors))
            }
            WorkUnit::Compute { .. } => Err(BackendError::Unsupported("compute")),
            WorkUnit::Batch(_) => Err(BackendError::Unsupported("batch")),
        }
    }
}
