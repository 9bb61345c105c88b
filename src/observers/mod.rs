// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Shipped [`crate::traits::EvaluationObserver`] implementations.

mod reporting;
mod tracing_observer;

pub use reporting::{Reporter, ReportingObserver, StepId};
pub use tracing_observer::TracingObserver;
