// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The evaluation engine.
//!
//! Leaves first: [`BackendCall`] invokes one backend and always returns a
//! tagged result, [`FanOutExecutor`] runs calls concurrently on a
//! [`WorkerPool`] and joins them in input order, [`MetricPipeline`] drives a
//! metric's stages while narrowing the active backend set through an
//! [`ExclusionLedger`], and [`Notifier`] delivers lifecycle events to
//! observers.

pub mod aggregation;
pub mod call;
pub mod executor;
pub mod ledger;
pub mod notifier;
pub mod pipeline;
pub mod pool;

#[cfg(test)]
mod integration_tests;

pub use aggregation::{AggregationMode, Aggregator};
pub use call::BackendCall;
pub use executor::FanOutExecutor;
pub use ledger::ExclusionLedger;
pub use notifier::Notifier;
pub use pipeline::{EvaluationHandle, MetricPipeline, ParentSource};
pub use pool::WorkerPool;
