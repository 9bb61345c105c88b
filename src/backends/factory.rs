// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::backends::ScriptedBackend;
use crate::config::{BackendConfig, BackendType};
use crate::errors::BackendMapError;
use crate::model::Embedding;
use crate::traits::ScoringBackend;

/// Options understood by scripted backends.
///
/// Any key not listed here becomes a field of the default response, so
/// `{ verdict: 1, score: 4 }` answers every prompt with that object.
#[derive(Debug, Default, Deserialize)]
struct ScriptedOptions {
    latency_ms: Option<u64>,
    /// Explicit default response; takes precedence over loose fields
    response: Option<Value>,
    /// Fail every unmatched prompt with this message
    error: Option<String>,
    #[serde(default)]
    rules: Vec<ScriptedRule>,
    embeddings: Option<Vec<Embedding>>,
    #[serde(default)]
    fail_on_calls: Vec<usize>,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ScriptedRule {
    when: String,
    response: Option<Value>,
    error: Option<String>,
}

/// Factory for creating backend instances from configuration
pub struct BackendFactory;

impl BackendFactory {
    /// Create a backend instance from configuration
    ///
    /// The `type` field selects the implementation:
    /// - `scripted` -> [`ScriptedBackend`] built from `options`
    /// - `http` -> recognised, not implemented
    pub fn create(config: &BackendConfig) -> Result<Arc<dyn ScoringBackend>, BackendMapError> {
        match config.backend {
            BackendType::Scripted => Ok(Arc::new(Self::scripted(config)?)),
            BackendType::Http => Err(BackendMapError::BackendNotImplemented {
                backend_id: config.id.clone(),
                backend: config.backend,
            }),
        }
    }

    fn scripted(config: &BackendConfig) -> Result<ScriptedBackend, BackendMapError> {
        let creation_failed = |reason: String| BackendMapError::BackendCreationFailed {
            backend_id: config.id.clone(),
            backend: config.backend,
            reason,
        };

        let raw: Map<String, Value> = config.options.clone().into_iter().collect();
        let options: ScriptedOptions =
            serde_json::from_value(Value::Object(raw)).map_err(|e| creation_failed(e.to_string()))?;

        let mut backend = ScriptedBackend::new(config.id.as_str());

        for rule in options.rules {
            backend = match (rule.response, rule.error) {
                (Some(response), None) => backend.respond_when(rule.when, response),
                (None, Some(error)) => backend.fail_when(rule.when, error),
                _ => {
                    return Err(creation_failed(format!(
                        "rule for '{}' needs exactly one of 'response' or 'error'",
                        rule.when
                    )))
                }
            };
        }

        backend = match (options.response, options.error) {
            (Some(_), Some(_)) => {
                return Err(creation_failed("'response' and 'error' are mutually exclusive".into()))
            }
            (Some(response), None) => backend.respond(response),
            (None, Some(error)) => backend.failing(error),
            (None, None) if !options.fields.is_empty() => backend.respond(Value::Object(options.fields)),
            (None, None) => backend,
        };

        if let Some(latency_ms) = options.latency_ms {
            backend = backend.latency(Duration::from_millis(latency_ms));
        }
        if let Some(vectors) = options.embeddings {
            backend = backend.embeddings(vectors);
        }
        for call in options.fail_on_calls {
            backend = backend.fail_on_call(call);
        }

        Ok(backend)
    }

    /// List all backend types this crate can instantiate
    pub fn list_available_types() -> Vec<BackendType> {
        vec![BackendType::Scripted]
    }
}
