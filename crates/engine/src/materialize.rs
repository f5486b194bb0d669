// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Merge-and-write
//!
//! Collapses an object's event history into its JSON documents and the
//! query cache. Once written, the events whose effect is reflected on disk
//! become compactable.

use crate::{CrdtEngine, DeletionService, EngineError};
use yaba_core::{Clock, EntityDocument, IdGen, MergedState};
use yaba_storage::{CacheEntry, EntityStore, EventStore, LocalCache};

/// Counts from a full materialization pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterializeSummary {
    pub live: usize,
    pub deleted: usize,
}

#[derive(Clone)]
pub struct Materializer<E, F, L, C, I> {
    engine: CrdtEngine<E, F, C, I>,
    deletion: DeletionService<E, F, L, C, I>,
    cache: L,
}

impl<E, F, L, C, I> Materializer<E, F, L, C, I>
where
    E: EventStore,
    F: EntityStore,
    L: LocalCache,
    C: Clock,
    I: IdGen,
{
    pub fn new(
        engine: CrdtEngine<E, F, C, I>,
        deletion: DeletionService<E, F, L, C, I>,
        cache: L,
    ) -> Self {
        Self {
            engine,
            deletion,
            cache,
        }
    }

    /// Write the merged state of one object to disk and cache
    pub async fn materialize(&self, object_id: &str) -> Result<Option<MergedState>, EngineError> {
        let Some(state) = self.engine.merge_events_for_object(object_id).await? else {
            return Ok(None);
        };

        if state.is_deleted {
            self.deletion
                .apply_remote_delete(state.object_type, object_id, &state.merged_clock)
                .await?;
            return Ok(Some(state));
        }

        let entities = self.engine.entity_store();
        let events = self.engine.events_for_object(object_id).await?;
        for (file, resolved) in &state.documents {
            let existing = match entities.read_document(state.object_type, object_id, *file).await {
                Ok(doc) => doc,
                Err(e) if e.is_corruption() => {
                    tracing::warn!(object_id, error = %e, "overwriting corrupt document");
                    None
                }
                Err(e) => return Err(e.into()),
            };

            let mut doc = existing
                .clone()
                .unwrap_or_else(|| EntityDocument::new(object_id));
            doc.fields = resolved
                .iter()
                .map(|(field, value)| (field.clone(), value.value.clone()))
                .collect();
            doc.field_clocks = resolved
                .iter()
                .map(|(field, value)| (field.clone(), value.winning_clock.clone()))
                .collect();
            doc.clock = events
                .iter()
                .filter(|event| event.file == *file && !event.is_delete())
                .map(|event| &event.clock)
                .chain(doc.field_clocks.values())
                .fold(doc.clock.clone(), |clock, other| clock.merge(other));

            if existing.as_ref() != Some(&doc) {
                entities.write_document(state.object_type, *file, &doc).await?;
                tracing::debug!(object_id, file = ?file, clock = %doc.clock, "wrote document");
            }
        }

        let entry = CacheEntry {
            object_type: state.object_type,
            id: object_id.to_string(),
            fields: state.fields(state.object_type.primary_document()),
        };
        self.cache.upsert(entry).await?;
        Ok(Some(state))
    }

    /// Materialize every object that still has events
    pub async fn materialize_all(&self) -> Result<MaterializeSummary, EngineError> {
        let mut summary = MaterializeSummary::default();
        for object_id in self.engine.object_ids_with_events().await? {
            match self.materialize(&object_id).await? {
                Some(state) if state.is_deleted => summary.deleted += 1,
                Some(_) => summary.live += 1,
                None => {}
            }
        }
        tracing::info!(live = summary.live, deleted = summary.deleted, "materialized all objects");
        Ok(summary)
    }
}

#[cfg(test)]
#[path = "materialize_tests.rs"]
mod tests;
