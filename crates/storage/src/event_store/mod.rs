// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable CRDT event storage

mod file;
mod memory;

pub use file::FileEventStore;
pub use memory::MemoryEventStore;

use crate::StorageError;
use async_trait::async_trait;
use yaba_core::CrdtEvent;

/// Append-only store of CRDT events
///
/// Inserting an event whose id is already stored is a no-op. Events are
/// only ever removed by log compaction through
/// [`delete_events_by_ids`](EventStore::delete_events_by_ids).
#[async_trait]
pub trait EventStore: Clone + Send + Sync + 'static {
    /// Returns `false` when the event was already stored
    async fn insert_event(&self, event: &CrdtEvent) -> Result<bool, StorageError> {
        let inserted = self.insert_events(std::slice::from_ref(event)).await?;
        Ok(inserted > 0)
    }

    /// Durably append a batch; returns the number of new events
    async fn insert_events(&self, events: &[CrdtEvent]) -> Result<usize, StorageError>;

    /// Events for one object, ordered by timestamp
    async fn events_for_object(&self, object_id: &str) -> Result<Vec<CrdtEvent>, StorageError>;

    /// Every stored event, ordered by timestamp
    async fn all_events(&self) -> Result<Vec<CrdtEvent>, StorageError>;

    /// Events with a timestamp strictly greater than `timestamp`
    async fn events_after_timestamp(&self, timestamp: i64)
        -> Result<Vec<CrdtEvent>, StorageError>;

    /// Returns the number of events removed
    async fn delete_events_by_ids(&self, event_ids: &[String]) -> Result<usize, StorageError>;

    async fn object_ids_with_events(&self) -> Result<Vec<String>, StorageError>;

    async fn event_count(&self) -> Result<u64, StorageError>;

    async fn contains_event(&self, event_id: &str) -> Result<bool, StorageError>;
}

/// Stable timestamp order shared by the store implementations
fn sort_by_timestamp(events: &mut [CrdtEvent]) {
    events.sort_by_key(|event| event.timestamp);
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
