// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for configuration loading and validation.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Configuration file parsed and validated.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use the_jury::observability::messages::config::ConfigLoaded;
///
/// let msg = ConfigLoaded {
///     path: "jury.yaml",
///     backend_count: 3,
///     metric_count: 2,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct ConfigLoaded<'a> {
    pub path: &'a str,
    pub backend_count: usize,
    pub metric_count: usize,
}

impl Display for ConfigLoaded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Loaded config '{}': {} backends, {} metrics",
            self.path, self.backend_count, self.metric_count
        )
    }
}

impl StructuredLog for ConfigLoaded<'_> {
    fn log(&self) {
        tracing::info!(
            path = self.path,
            backend_count = self.backend_count,
            metric_count = self.metric_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "config_loaded",
            span_name = name,
            path = self.path,
        )
    }
}

/// Configuration rejected by validation.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct ConfigValidationFailed<'a> {
    pub path: &'a str,
    pub error_count: usize,
}

impl Display for ConfigValidationFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Config '{}' failed validation with {} error(s)",
            self.path, self.error_count
        )
    }
}

impl StructuredLog for ConfigValidationFailed<'_> {
    fn log(&self) {
        tracing::error!(
            path = self.path,
            error_count = self.error_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "config_validation_failed",
            span_name = name,
            path = self.path,
        )
    }
}
