// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! This module provides centralized message types for all diagnostic and operational
//! logging throughout the jury. Message types follow a struct-based pattern with a
//! `Display` implementation to:
//!
//! * Eliminate magic strings scattered throughout the codebase
//! * Keep log wording in one place per subsystem
//! * Provide consistent, structured logging output
//!
//! # Architecture
//!
//! Messages are organized by subsystem:
//! * `messages::evaluation` - Evaluation and stage lifecycle, exclusions
//! * `messages::backend` - Individual backend call results
//! * `messages::observer` - Observer hook failures and hook traces
//! * `messages::config` - Configuration loading and validation
//!
//! # Usage
//!
//! ```rust
//! use the_jury::observability::messages::backend::BackendCallFailed;
//! use the_jury::observability::messages::StructuredLog;
//! use the_jury::errors::BackendError;
//!
//! let error = BackendError::call("connection reset");
//! let msg = BackendCallFailed {
//!     backend_id: "judge-a",
//!     error: &error,
//!     duration: std::time::Duration::from_millis(12),
//! };
//!
//! msg.log();
//! ```

pub mod messages;
