// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for observer notifications.
//!
//! Observer failures never affect an evaluation; these messages are the only
//! trace they leave.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Observer hook returned an error.
///
/// # Log Level
/// `warn!` - Misbehaving collaborator
pub struct ObserverHookFailed<'a> {
    pub observer: &'a str,
    pub hook: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for ObserverHookFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Observer '{}' failed in {}: {}",
            self.observer, self.hook, self.error
        )
    }
}

impl StructuredLog for ObserverHookFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            observer = self.observer,
            hook = self.hook,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "observer_hook_failed",
            span_name = name,
            observer = self.observer,
            hook = self.hook,
        )
    }
}

/// Observer hook panicked.
///
/// # Log Level
/// `error!` - Misbehaving collaborator
pub struct ObserverHookPanicked<'a> {
    pub observer: &'a str,
    pub hook: &'a str,
    pub message: &'a str,
}

impl Display for ObserverHookPanicked<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Observer '{}' panicked in {}: {}",
            self.observer, self.hook, self.message
        )
    }
}

impl StructuredLog for ObserverHookPanicked<'_> {
    fn log(&self) {
        tracing::error!(
            observer = self.observer,
            hook = self.hook,
            panic = self.message,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "observer_hook_panicked",
            span_name = name,
            observer = self.observer,
            hook = self.hook,
        )
    }
}

/// Lifecycle hook delivered to the tracing observer.
///
/// # Log Level
/// `debug!` - Per-hook detail; the pipeline logs the same events at `info!`
///
/// # Example
/// ```
/// use the_jury::observability::messages::observer::HookReceived;
///
/// let msg = HookReceived {
///     observer: "tracing",
///     hook: "before_stage",
///     detail: "stage 'single_turn_aspect_critic' (0/1) on 3 backends",
/// };
///
/// tracing::debug!("{}", msg);
/// ```
pub struct HookReceived<'a> {
    pub observer: &'a str,
    pub hook: &'a str,
    pub detail: &'a str,
}

impl Display for HookReceived<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Observer '{}' received {}: {}", self.observer, self.hook, self.detail)
    }
}

impl StructuredLog for HookReceived<'_> {
    fn log(&self) {
        tracing::debug!(
            observer = self.observer,
            hook = self.hook,
            detail = self.detail,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "observer_hook",
            span_name = name,
            observer = self.observer,
            hook = self.hook,
        )
    }
}
