// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod backend;
mod backend_map;
mod config;
mod evaluation;
mod observer;

pub use backend::BackendError;
pub use backend_map::BackendMapError;
pub use config::{ConfigError, RuntimeError, ValidationError};
pub use evaluation::{EvaluationError, MetricError};
pub use observer::ObserverError;
