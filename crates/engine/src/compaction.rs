// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event log compaction
//!
//! An event can go once the on-disk snapshot already reflects it, or once
//! its object is deleted. DELETE events stay forever so a deletion can
//! never be undone by a peer that missed it.

use crate::EngineError;
use std::cmp::Ordering;
use yaba_core::{is_system_entity, CompactionConfig, CrdtEvent, VectorClock};
use yaba_storage::{EntitySnapshot, EntityStore, EventStore};

/// Size of the event log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogStats {
    pub total_events: u64,
    pub object_count: usize,
    pub needs_compaction: bool,
}

/// Outcome of one compaction run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactionReport {
    pub objects_scanned: usize,
    pub events_removed: usize,
    pub delete_events_retained: usize,
}

impl CompactionReport {
    fn absorb(&mut self, other: CompactionReport) {
        self.objects_scanned += other.objects_scanned;
        self.events_removed += other.events_removed;
        self.delete_events_retained += other.delete_events_retained;
    }
}

#[derive(Clone)]
pub struct LogCompaction<E, F> {
    events: E,
    entities: F,
    max_event_count: u64,
}

impl<E: EventStore, F: EntityStore> LogCompaction<E, F> {
    pub fn new(events: E, entities: F, config: &CompactionConfig) -> Self {
        Self {
            events,
            entities,
            max_event_count: config.max_event_count,
        }
    }

    pub async fn is_compaction_needed(&self) -> Result<bool, EngineError> {
        Ok(self.events.event_count().await? > self.max_event_count)
    }

    /// Compact only when the log is over its size limit
    pub async fn compact_if_needed(&self) -> Result<Option<CompactionReport>, EngineError> {
        if !self.is_compaction_needed().await? {
            return Ok(None);
        }
        self.compact().await.map(Some)
    }

    /// Compact every object with events
    pub async fn compact(&self) -> Result<CompactionReport, EngineError> {
        let mut report = CompactionReport::default();
        for object_id in self.events.object_ids_with_events().await? {
            report.absorb(self.compact_object(&object_id).await?);
        }
        tracing::info!(
            objects = report.objects_scanned,
            removed = report.events_removed,
            deletes_retained = report.delete_events_retained,
            "compaction finished"
        );
        Ok(report)
    }

    /// Remove the redundant events of one object
    pub async fn compact_object(&self, object_id: &str) -> Result<CompactionReport, EngineError> {
        let events = self.events.events_for_object(object_id).await?;
        let Some(object_type) = events.first().map(|event| event.object_type) else {
            return Ok(CompactionReport::default());
        };

        let delete_events_retained = events.iter().filter(|e| e.is_delete()).count();
        // System entities are never deleted, whatever their events say
        let deleted = !is_system_entity(object_type, object_id)
            && (delete_events_retained > 0
                || self.entities.is_deleted(object_type, object_id).await?);

        let removable: Vec<String> = if deleted {
            events
                .iter()
                .filter(|event| !event.is_delete())
                .map(|event| event.event_id.clone())
                .collect()
        } else {
            let snapshot = self.entities.snapshot(object_type, object_id).await?;
            let snapshot_clock = snapshot.clock();
            events
                .iter()
                .filter(|event| !event.is_delete())
                .filter(|event| is_reflected(&snapshot, &snapshot_clock, event))
                .map(|event| event.event_id.clone())
                .collect()
        };

        let events_removed = if removable.is_empty() {
            0
        } else {
            self.events.delete_events_by_ids(&removable).await?
        };
        if events_removed > 0 {
            tracing::debug!(object_id, %object_type, events_removed, "compacted object");
        }

        Ok(CompactionReport {
            objects_scanned: 1,
            events_removed,
            delete_events_retained,
        })
    }

    pub async fn stats(&self) -> Result<LogStats, EngineError> {
        let total_events = self.events.event_count().await?;
        Ok(LogStats {
            total_events,
            object_count: self.events.object_ids_with_events().await?.len(),
            needs_compaction: total_events > self.max_event_count,
        })
    }
}

/// Snapshot dominates the event and holds its field at least as new
fn is_reflected(snapshot: &EntitySnapshot, snapshot_clock: &VectorClock, event: &CrdtEvent) -> bool {
    if !snapshot_clock.is_newer_or_equal(&event.clock) {
        return false;
    }
    let Some(doc) = snapshot.documents.get(&event.file) else {
        return false;
    };
    if !doc.fields.contains_key(&event.field) {
        return false;
    }
    VectorClock::resolution_cmp(doc.field_clock(&event.field), &event.clock) != Ordering::Less
}

#[cfg(test)]
#[path = "compaction_tests.rs"]
mod tests;
