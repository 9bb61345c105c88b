// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Configuration validation.
//!
//! Every check runs and every problem is reported, so one round trip fixes a
//! whole config file:
//!
//! 1. **Backends**: at least one, ids unique
//! 2. **Metric references**: metric names are known, backend subsets only
//!    name configured backends, thresholds lie in `[0, 1]`
//! 3. **Pool**: sizes, when given, are non-zero and `max_concurrency` fits
//!    the permit semaphore
//!
//! # Examples
//!
//! ```rust
//! use the_jury::config::{validate_config, BackendConfig, BackendType, JuryConfig, PoolOptions};
//! use std::collections::BTreeMap;
//!
//! let config = JuryConfig {
//!     pool: PoolOptions::default(),
//!     backends: vec![BackendConfig {
//!         id: "judge-a".to_string(),
//!         backend: BackendType::Scripted,
//!         endpoint: None,
//!         options: BTreeMap::new(),
//!     }],
//!     metrics: BTreeMap::new(),
//! };
//!
//! assert!(validate_config(&config).is_ok());
//! ```

use crate::config::JuryConfig;
use crate::errors::ValidationError;
use crate::metrics::MetricFactory;
use std::collections::HashSet;
use tokio::sync::Semaphore;

/// Validate a loaded configuration, collecting every problem found.
pub fn validate_config(config: &JuryConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let backend_ids = validate_backends(config, &mut errors);
    validate_metrics(config, &backend_ids, &mut errors);
    validate_pool(config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_backends<'a>(config: &'a JuryConfig, errors: &mut Vec<ValidationError>) -> HashSet<&'a str> {
    if config.backends.is_empty() {
        errors.push(ValidationError::NoBackends);
    }

    let mut seen = HashSet::new();
    for backend in &config.backends {
        if !seen.insert(backend.id.as_str()) {
            errors.push(ValidationError::DuplicateBackendId {
                backend_id: backend.id.clone(),
            });
        }
    }
    seen
}

fn validate_metrics(config: &JuryConfig, backend_ids: &HashSet<&str>, errors: &mut Vec<ValidationError>) {
    for (metric, metric_config) in &config.metrics {
        if !MetricFactory::is_available(metric) {
            errors.push(ValidationError::UnknownMetric {
                metric: metric.clone(),
            });
        }

        for backend_id in &metric_config.backends {
            if !backend_ids.contains(backend_id.as_str()) {
                errors.push(ValidationError::UnknownBackend {
                    metric: metric.clone(),
                    backend_id: backend_id.to_string(),
                });
            }
        }

        if let Some(threshold) = metric_config.threshold {
            if !(0.0..=1.0).contains(&threshold) {
                errors.push(ValidationError::ThresholdOutOfRange {
                    metric: metric.clone(),
                    threshold,
                });
            }
        }
    }
}

fn validate_pool(config: &JuryConfig, errors: &mut Vec<ValidationError>) {
    if config.pool.max_concurrency == Some(0) {
        errors.push(ValidationError::ZeroPoolSize {
            option: "max_concurrency",
        });
    }
    if let Some(value) = config.pool.max_concurrency {
        if value > Semaphore::MAX_PERMITS {
            errors.push(ValidationError::PoolSizeTooLarge {
                value,
                max: Semaphore::MAX_PERMITS,
            });
        }
    }
    if config.pool.worker_threads == Some(0) {
        errors.push(ValidationError::ZeroPoolSize {
            option: "worker_threads",
        });
    }
}
