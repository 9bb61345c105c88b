// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message type implements `Display` for the human-readable line and
//! [`StructuredLog`] for emitting it as a `tracing` event with typed fields.
//!
//! # Usage Pattern
//!
//! ```rust
//! use the_jury::observability::messages::evaluation::EvaluationStarted;
//! use the_jury::observability::messages::StructuredLog;
//!
//! let msg = EvaluationStarted {
//!     evaluation_id: 7,
//!     metric: "aspect_critic",
//!     backend_count: 3,
//!     total_stages: 1,
//! };
//!
//! msg.log();
//! let span = msg.span("evaluation");
//! let _entered = span.enter();
//! ```

pub mod backend;
pub mod config;
pub mod evaluation;
pub mod observer;

use tracing::Span;

/// A message that knows its own log level and structured fields.
pub trait StructuredLog: std::fmt::Display {
    /// Emit the message as a `tracing` event at its natural level.
    fn log(&self);

    /// Build a span carrying the message's fields.
    fn span(&self, name: &str) -> Span;
}
