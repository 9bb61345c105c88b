// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::errors::BackendError;
use crate::model::{Embedding, InferenceRequest};

/// One independently invokable scoring endpoint.
///
/// Implementations may fail freely; the engine converts every failure (and
/// every panic) into data at the call boundary. Timeouts and retries belong
/// to the implementation, not to the engine.
#[async_trait]
pub trait ScoringBackend: Send + Sync {
    /// Run a structured inference request and return the raw JSON answer.
    async fn complete(&self, request: &InferenceRequest) -> Result<serde_json::Value, BackendError>;

    /// Embed a batch of texts, one vector per text.
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Embedding>, BackendError> {
        Err(BackendError::Unsupported("embed"))
    }

    fn name(&self) -> &str;
}
