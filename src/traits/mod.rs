// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod backend;
pub mod metric;
pub mod observer;

pub use crate::config::BackendMap;
pub use backend::ScoringBackend;
pub use metric::{Metric, StagePlan, StageWork};
pub use observer::EvaluationObserver;
