// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::backends::BackendFactory;
use crate::errors::BackendMapError;
use crate::model::BackendId;
use crate::traits::ScoringBackend;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A registry mapping backend IDs to their implementations.
///
/// Backends are held as `Arc<dyn ScoringBackend>` so every concurrent call of
/// every evaluation shares the same instance. Iteration is in id order, which
/// is the order used when a metric does not restrict its backend set.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use serde_json::json;
/// use the_jury::backends::ScriptedBackend;
/// use the_jury::config::BackendMap;
///
/// let mut backends = BackendMap::new();
/// backends.insert("judge-b".into(), Arc::new(ScriptedBackend::new("judge-b").respond(json!({"verdict": 1}))));
/// backends.insert("judge-a".into(), Arc::new(ScriptedBackend::new("judge-a").respond(json!({"verdict": 0}))));
///
/// let ids: Vec<&str> = backends.keys().map(|id| id.as_str()).collect();
/// assert_eq!(ids, vec!["judge-a", "judge-b"]);
/// ```
#[derive(Clone, Default)]
pub struct BackendMap(pub BTreeMap<BackendId, Arc<dyn ScoringBackend>>);

impl BackendMap {
    /// Create a new empty backend map
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Create a BackendMap from configuration, instantiating every backend
    pub fn from_config(cfg: &crate::config::JuryConfig) -> Result<Self, BackendMapError> {
        let mut registry = BTreeMap::new();

        for backend in &cfg.backends {
            let instance = BackendFactory::create(backend)?;
            registry.insert(BackendId::from(backend.id.as_str()), instance);
        }

        Ok(Self(registry))
    }

    /// Insert a backend into the map
    pub fn insert(&mut self, id: BackendId, backend: Arc<dyn ScoringBackend>) {
        self.0.insert(id, backend);
    }

    /// Get a backend by ID
    pub fn get(&self, id: &BackendId) -> Option<&Arc<dyn ScoringBackend>> {
        self.0.get(id)
    }

    /// Check if a backend exists
    pub fn contains_key(&self, id: &BackendId) -> bool {
        self.0.contains_key(id)
    }

    /// All backend IDs, in order
    pub fn keys(&self) -> impl Iterator<Item = &BackendId> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for BackendMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendMap")
            .field("backend_count", &self.0.len())
            .field("backend_ids", &self.0.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl From<BTreeMap<BackendId, Arc<dyn ScoringBackend>>> for BackendMap {
    fn from(map: BTreeMap<BackendId, Arc<dyn ScoringBackend>>) -> Self {
        Self(map)
    }
}
