// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::BackendMapError;
use std::path::PathBuf;
use thiserror::Error;

/// Problems found while validating a loaded configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Two backends share the same id
    #[error("Duplicate backend ID: '{backend_id}'")]
    DuplicateBackendId { backend_id: String },

    /// A metric name no metric implementation answers to
    #[error("Unknown metric '{metric}'")]
    UnknownMetric { metric: String },

    /// A metric restricts itself to a backend that is not configured
    #[error("Metric '{metric}' references backend '{backend_id}' which does not exist")]
    UnknownBackend { metric: String, backend_id: String },

    /// A pass threshold outside the unit interval
    #[error("Metric '{metric}' has threshold {threshold} outside [0, 1]")]
    ThresholdOutOfRange { metric: String, threshold: f64 },

    /// A pool size of zero
    #[error("Pool option '{option}' must be greater than zero")]
    ZeroPoolSize { option: &'static str },

    /// More concurrent calls than the pool's permit semaphore can hold
    #[error("Pool option 'max_concurrency' is {value}, above the limit of {max}")]
    PoolSizeTooLarge { value: usize, max: usize },

    /// No backends at all
    #[error("Configuration declares no backends")]
    NoBackends,
}

/// Errors raised while loading configuration from disk
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration validation failed:\n{}", join_lines(.0))]
    Invalid(Vec<ValidationError>),
}

/// Errors raised while turning a configuration into a runnable jury
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Backends(#[from] BackendMapError),

    #[error("Failed to start worker pool: {0}")]
    Pool(#[from] std::io::Error),
}

fn join_lines(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
