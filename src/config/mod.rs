// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod backend_map;
mod loader;
mod runtime;
mod validation;

pub mod consts;

pub use backend_map::BackendMap;
pub use loader::{load_and_validate_config, load_config, BackendConfig, BackendType, JuryConfig, PoolOptions};
pub use runtime::RuntimeBuilder;
pub use validation::validate_config;
