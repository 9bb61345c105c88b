// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::model::{BackendId, ExclusionEvent, StageRecord};

/// Active backend set plus the exclusions that narrowed it.
///
/// The active set only ever shrinks, so the exclusion list and the set of
/// backends that end up scored are disjoint without any reconciliation.
#[derive(Debug, Clone)]
pub struct ExclusionLedger {
    active: Vec<BackendId>,
    events: Vec<ExclusionEvent>,
}

impl ExclusionLedger {
    pub fn new(backend_ids: Vec<BackendId>) -> Self {
        let mut active: Vec<BackendId> = Vec::with_capacity(backend_ids.len());
        for id in backend_ids {
            if !active.contains(&id) {
                active.push(id);
            }
        }
        Self {
            active,
            events: Vec::new(),
        }
    }

    /// Backends still in the evaluation, in their original order.
    pub fn active(&self) -> &[BackendId] {
        &self.active
    }

    pub fn events(&self) -> &[ExclusionEvent] {
        &self.events
    }

    pub fn excluded(&self) -> Vec<BackendId> {
        self.events.iter().map(|e| e.backend_id.clone()).collect()
    }

    /// Exclude every active backend that did not succeed in `record`.
    ///
    /// Backends with a failed result carry its error as the cause; active
    /// backends missing from the record entirely are excluded without one.
    /// Returns the events created by this call.
    pub fn record_stage(&mut self, record: &StageRecord) -> Vec<ExclusionEvent> {
        let dropped: Vec<(BackendId, Option<String>)> = self
            .active
            .iter()
            .filter_map(|id| {
                match record.results.iter().find(|r| &r.backend_id == id) {
                    Some(result) => result.error().map(|e| (id.clone(), Some(e.to_string()))),
                    None => Some((id.clone(), None)),
                }
            })
            .collect();

        dropped
            .into_iter()
            .filter_map(|(id, cause)| self.exclude(&id, &record.stage_name, record.stage_index, cause))
            .collect()
    }

    /// Exclude one backend. No-op (returns `None`) if it is not active.
    pub fn exclude(
        &mut self,
        backend_id: &BackendId,
        stage_name: &str,
        stage_index: usize,
        cause: Option<String>,
    ) -> Option<ExclusionEvent> {
        let position = self.active.iter().position(|id| id == backend_id)?;
        self.active.remove(position);

        let event = ExclusionEvent {
            backend_id: backend_id.clone(),
            failed_stage_name: stage_name.to_string(),
            failed_stage_index: stage_index,
            cause,
        };
        self.events.push(event.clone());
        Some(event)
    }
}
