// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors for backend map creation and backend instantiation.

use crate::config::BackendType;
use thiserror::Error;

/// Errors that can occur during backend map creation
#[derive(Debug, Error)]
pub enum BackendMapError {
    /// A backend type is recognised but has no client in this crate
    #[error("Backend type '{backend:?}' is not implemented for backend '{backend_id}'. {} is not yet supported.", describe(.backend))]
    BackendNotImplemented {
        backend_id: String,
        backend: BackendType,
    },

    /// Failed to create a backend from configuration
    #[error("Failed to create {backend:?} backend '{backend_id}': {reason}")]
    BackendCreationFailed {
        backend_id: String,
        backend: BackendType,
        reason: String,
    },
}

fn describe(backend: &BackendType) -> &'static str {
    match backend {
        BackendType::Scripted => "Scripted in-process judging",
        BackendType::Http => "HTTP inference client",
    }
}
