// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Scoring backend implementations.
//!
//! # Available Backends
//!
//! ## Scripted Backend
//! Deterministic in-process judge:
//! - **Responses**: a default structured answer plus prompt-substring rules
//! - **Embeddings**: fixed vectors, or a letter histogram per text
//! - **Fault injection**: failing prompts, failing call numbers, panics, latency
//! - **Use Case**: demos, tests, dry runs of a metric configuration
//!
//! ## HTTP Backend
//! Recognised in configuration; creating one reports
//! `BackendMapError::BackendNotImplemented`.
//!
//! # Architecture
//!
//! ```text
//! Configuration → BackendFactory → Arc<dyn ScoringBackend> → BackendMap → FanOutExecutor
//! ```
//!
//! # Examples
//!
//! ```rust
//! use the_jury::backends::BackendFactory;
//! use the_jury::config::{BackendConfig, BackendType};
//! use the_jury::traits::ScoringBackend;
//! use std::collections::BTreeMap;
//!
//! let mut options = BTreeMap::new();
//! options.insert("verdict".to_string(), serde_json::json!(1));
//!
//! let config = BackendConfig {
//!     id: "judge-a".to_string(),
//!     backend: BackendType::Scripted,
//!     endpoint: None,
//!     options,
//! };
//!
//! let backend = BackendFactory::create(&config)?;
//! assert_eq!(backend.name(), "judge-a");
//! # Ok::<(), the_jury::errors::BackendMapError>(())
//! ```

pub mod factory;
pub mod scripted;

pub use factory::BackendFactory;
pub use scripted::{letter_histogram, InFlightProbe, ScriptedBackend};
