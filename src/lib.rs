// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod backends;   // scoring backends
pub mod config;     // config + runtime wiring
pub mod engine;     // fan-out/fan-in pipeline
pub mod errors;     // error handling
pub mod metrics;    // metric glue
pub mod model;      // shared data types
pub mod observability;
pub mod observers;  // shipped observers
pub mod traits;     // unified abstractions
