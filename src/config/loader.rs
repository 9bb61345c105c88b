// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::{DEFAULT_MAX_CONCURRENCY, DEFAULT_WORKER_THREADS};
use crate::errors::ConfigError;
use crate::model::MetricConfig;
use crate::observability::messages::config::{ConfigLoaded, ConfigValidationFailed};
use crate::observability::messages::StructuredLog;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Main configuration structure for the jury.
///
/// Describes the worker pool, the scoring backends and the metrics to run.
/// It is typically loaded from a YAML file.
///
/// # Fields
/// * `pool` - Worker pool sizing (optional, defaults to available parallelism)
/// * `backends` - Scoring backends, each with a unique id
/// * `metrics` - Metric settings keyed by metric name
///
/// # Example
/// ```yaml
/// pool:
///   max_concurrency: 8
///   worker_threads: 4
/// backends:
///   - id: judge-a
///     type: scripted
///     options:
///       verdict: 1
/// metrics:
///   aspect_critic:
///     backends: [judge-a]
///     threshold: 0.5
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct JuryConfig {
    #[serde(default)]
    pub pool: PoolOptions,
    pub backends: Vec<BackendConfig>,
    #[serde(default)]
    pub metrics: BTreeMap<String, MetricConfig>,
}

/// Worker pool sizing.
///
/// # Fields
/// * `max_concurrency` - Maximum number of backend calls in flight (optional)
/// * `worker_threads` - Threads of the pool's own runtime (optional)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PoolOptions {
    pub max_concurrency: Option<usize>,
    pub worker_threads: Option<usize>,
}

impl PoolOptions {
    /// Configured concurrency, or the machine's available parallelism.
    pub fn get_max_concurrency(&self) -> usize {
        self.max_concurrency
            .unwrap_or_else(|| available_parallelism(DEFAULT_MAX_CONCURRENCY))
    }

    /// Configured thread count, or the machine's available parallelism.
    pub fn get_worker_threads(&self) -> usize {
        self.worker_threads
            .unwrap_or_else(|| available_parallelism(DEFAULT_WORKER_THREADS))
    }
}

fn available_parallelism(fallback: usize) -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(fallback)
}

/// Configuration for a single scoring backend.
///
/// # Fields
/// * `id` - Unique identifier, referenced from metric backend subsets
/// * `backend` - The backend type that implements this judge
/// * `endpoint` - Network endpoint (for HTTP backends)
/// * `options` - Backend-specific options
///
/// # Example
/// ```yaml
/// id: "judge-a"
/// type: scripted
/// options:
///   latency_ms: 15
///   response: { verdict: 1, reason: "grounded" }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub backend: BackendType,
    pub endpoint: Option<String>, // for http
    #[serde(default)]
    pub options: BTreeMap<String, serde_json::Value>,
}

/// Backend implementation type.
///
/// # Variants
/// * `Scripted` - Deterministic in-process judge
/// * `Http` - Remote inference service
#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum BackendType {
    Scripted,
    Http,
}

/// Load a config from a YAML file (or TOML, when the extension is `.toml`)
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<JuryConfig, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg: JuryConfig = if is_toml {
        toml::from_str(&content)?
    } else {
        serde_yaml::from_str(&content)?
    };

    ConfigLoaded {
        path: &path.display().to_string(),
        backend_count: cfg.backends.len(),
        metric_count: cfg.metrics.len(),
    }
    .log();

    Ok(cfg)
}

/// Load and validate a config file
///
/// Every validation problem is reported at once in [`ConfigError::Invalid`].
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<JuryConfig, ConfigError> {
    let path = path.as_ref();
    let cfg = load_config(path)?;

    if let Err(validation_errors) = crate::config::validate_config(&cfg) {
        ConfigValidationFailed {
            path: &path.display().to_string(),
            error_count: validation_errors.len(),
        }
        .log();
        return Err(ConfigError::Invalid(validation_errors));
    }

    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::AggregationMode;
    use crate::model::BackendId;
    use std::io::Write;

    #[test]
    fn parse_basic_config() {
        let yaml = r#"
backends:
  - id: judge-a
    type: scripted
    options:
      verdict: 1
  - id: judge-b
    type: http
    endpoint: https://judge.internal/v1
metrics:
  aspect_critic:
    backends: [judge-a]
    aggregation: median
"#;

        let cfg: JuryConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.backends.len(), 2);
        assert_eq!(cfg.backends[0].backend, BackendType::Scripted);
        assert_eq!(cfg.backends[0].options["verdict"], serde_json::json!(1));
        assert_eq!(cfg.backends[1].endpoint.as_deref(), Some("https://judge.internal/v1"));

        let metric = &cfg.metrics["aspect_critic"];
        assert_eq!(metric.backends, vec![BackendId::from("judge-a")]);
        assert_eq!(metric.aggregation, AggregationMode::Median);
        assert_eq!(metric.threshold, None);
    }

    #[test]
    fn pool_options_fall_back_to_parallelism() {
        let options = PoolOptions::default();
        assert!(options.get_max_concurrency() >= 1);
        assert!(options.get_worker_threads() >= 1);

        let options = PoolOptions {
            max_concurrency: Some(3),
            worker_threads: Some(2),
        };
        assert_eq!(options.get_max_concurrency(), 3);
        assert_eq!(options.get_worker_threads(), 2);
    }

    #[test]
    fn load_toml_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[pool]
max_concurrency = 2

[[backends]]
id = "judge-a"
type = "scripted"

[metrics.rubrics_score]
aggregation = "min"
"#
        )
        .unwrap();

        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.pool.max_concurrency, Some(2));
        assert_eq!(cfg.metrics["rubrics_score"].aggregation, AggregationMode::Min);
    }

    #[test]
    fn missing_file_reports_path() {
        let result = load_config("/nonexistent/jury.yaml");
        match result {
            Err(ConfigError::Io { path, .. }) => assert_eq!(path, Path::new("/nonexistent/jury.yaml")),
            other => panic!("expected Io error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_backend_type_is_a_parse_error() {
        let yaml = r#"
backends:
  - id: judge-a
    type: carrier_pigeon
"#;
        let result: Result<JuryConfig, _> = serde_yaml::from_str(yaml);
        assert!(result.is_err());
    }
}
