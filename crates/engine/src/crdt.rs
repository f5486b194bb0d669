// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-field CRDT engine
//!
//! Local edits become [`CrdtEvent`]s stamped with an incremented vector
//! clock. Remote events are stored verbatim. The current value of every
//! field is derived by replaying the events for an object on top of the
//! on-disk snapshot, picking one winner per `(file, field)` with a total
//! order over clocks so every replica lands on the same value.

use crate::EngineError;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use yaba_core::{
    is_system_entity, Clock, CrdtEvent, EventKind, FieldValue, FileTarget, IdGen, MergedState,
    ObjectType, ReplicaId, ResolvedValue, VectorClock, DELETED_FIELD,
};
use yaba_storage::{EntityStore, EventStore, OperationLog};

/// Pick the winning event of two writes to the same field
///
/// Causally newer wins. Concurrent writes fall back to
/// [`VectorClock::resolution_cmp`] and finally the event id, so the choice
/// is independent of argument order.
pub fn pick_winner<'a>(a: &'a CrdtEvent, b: &'a CrdtEvent) -> &'a CrdtEvent {
    let order = VectorClock::resolution_cmp(&a.clock, &b.clock)
        .then_with(|| a.event_id.cmp(&b.event_id));
    match order {
        Ordering::Less => b,
        Ordering::Equal | Ordering::Greater => a,
    }
}

/// Resolve one field from every event that wrote it
///
/// # Panics
///
/// When `events` is empty or mixes fields; callers group by
/// `(file, field)` first.
#[allow(clippy::panic)]
pub fn resolve_field_from_events(events: &[CrdtEvent]) -> ResolvedValue {
    let Some((first, rest)) = events.split_first() else {
        panic!("cannot resolve a field from zero events");
    };
    let winner = rest.iter().fold(first, |winner, event| {
        assert!(
            event.file == first.file && event.field == first.field,
            "mixed fields in resolution: {:?}/{} and {:?}/{}",
            first.file,
            first.field,
            event.file,
            event.field,
        );
        pick_winner(winner, event)
    });
    ResolvedValue {
        field: winner.field.clone(),
        value: winner.value.clone(),
        winning_clock: winner.clock.clone(),
    }
}

fn infer_kind(current_clock: &VectorClock) -> EventKind {
    if current_clock.is_empty() {
        EventKind::Create
    } else {
        EventKind::Update
    }
}

fn reject_reserved<'a>(mut fields: impl Iterator<Item = &'a str>) -> Result<(), EngineError> {
    match fields.find(|field| *field == DELETED_FIELD) {
        Some(field) => Err(EngineError::ReservedField(field.to_string())),
        None => Ok(()),
    }
}

/// CRDT engine for one replica
///
/// All `record_*` calls go through a single write lock so clock increments
/// for the local replica never interleave.
#[derive(Clone)]
pub struct CrdtEngine<E, F, C, I> {
    replica_id: ReplicaId,
    events: E,
    entities: F,
    clock: C,
    id_gen: I,
    outbox: Option<OperationLog>,
    write_lock: Arc<Mutex<()>>,
}

impl<E, F, C, I> CrdtEngine<E, F, C, I>
where
    E: EventStore,
    F: EntityStore,
    C: Clock,
    I: IdGen,
{
    pub fn new(replica_id: ReplicaId, events: E, entities: F, clock: C, id_gen: I) -> Self {
        Self {
            replica_id,
            events,
            entities,
            clock,
            id_gen,
            outbox: None,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Ship every locally recorded event through `outbox`
    pub fn with_outbox(mut self, outbox: OperationLog) -> Self {
        self.outbox = Some(outbox);
        self
    }

    pub fn replica_id(&self) -> &ReplicaId {
        &self.replica_id
    }

    pub fn event_store(&self) -> &E {
        &self.events
    }

    pub fn entity_store(&self) -> &F {
        &self.entities
    }

    pub fn outbox(&self) -> Option<&OperationLog> {
        self.outbox.as_ref()
    }

    /// Record a local change to one field
    ///
    /// `_deleted` is refused; deletes go through [`Self::record_delete`].
    pub async fn record_field_change(
        &self,
        object_id: &str,
        object_type: ObjectType,
        file: FileTarget,
        field: &str,
        value: FieldValue,
        current_clock: &VectorClock,
    ) -> Result<CrdtEvent, EngineError> {
        reject_reserved(std::iter::once(field))?;
        let kind = infer_kind(current_clock);
        self.record_kind(object_id, object_type, file, field, value, current_clock, kind)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn record_kind(
        &self,
        object_id: &str,
        object_type: ObjectType,
        file: FileTarget,
        field: &str,
        value: FieldValue,
        current_clock: &VectorClock,
        kind: EventKind,
    ) -> Result<CrdtEvent, EngineError> {
        let _guard = self.write_lock.lock().await;

        let timestamp = self.clock.now_millis();
        let event = CrdtEvent {
            event_id: self.id_gen.next(),
            object_id: object_id.to_string(),
            object_type,
            kind,
            file,
            field: field.to_string(),
            value,
            clock: current_clock.increment(&self.replica_id),
            timestamp,
        };

        self.persist_local(std::slice::from_ref(&event), timestamp)
            .await?;
        tracing::debug!(
            object_id,
            field,
            kind = ?event.kind,
            clock = %event.clock,
            "recorded"
        );
        Ok(event)
    }

    /// Record one event per field, incrementing the clock once per field
    ///
    /// Refuses `_deleted` like [`Self::record_field_change`]. Events are produced in key order and persisted as one batch. The
    /// kind is decided once from `current_clock`, so every field of a new
    /// entity is a CREATE.
    pub async fn record_field_changes(
        &self,
        object_id: &str,
        object_type: ObjectType,
        file: FileTarget,
        changes: &BTreeMap<String, FieldValue>,
        current_clock: &VectorClock,
    ) -> Result<Vec<CrdtEvent>, EngineError> {
        reject_reserved(changes.keys().map(String::as_str))?;
        let _guard = self.write_lock.lock().await;

        let timestamp = self.clock.now_millis();
        let kind = infer_kind(current_clock);
        let mut clock = current_clock.clone();
        let events: Vec<CrdtEvent> = changes
            .iter()
            .map(|(field, value)| {
                clock = clock.increment(&self.replica_id);
                CrdtEvent {
                    event_id: self.id_gen.next(),
                    object_id: object_id.to_string(),
                    object_type,
                    kind,
                    file,
                    field: field.clone(),
                    value: value.clone(),
                    clock: clock.clone(),
                    timestamp,
                }
            })
            .collect();

        self.persist_local(&events, timestamp).await?;
        tracing::debug!(
            object_id,
            fields = events.len(),
            clock = %clock,
            "recorded batch"
        );
        Ok(events)
    }

    /// Record the `_deleted = true` event that tombstones an object
    pub async fn record_delete(
        &self,
        object_id: &str,
        object_type: ObjectType,
        current_clock: &VectorClock,
    ) -> Result<CrdtEvent, EngineError> {
        self.record_kind(
            object_id,
            object_type,
            object_type.primary_document(),
            DELETED_FIELD,
            FieldValue::Bool(true),
            current_clock,
            EventKind::Delete,
        )
        .await
    }

    /// Event store first, then outbox; a failed outbox append takes the
    /// events back out so the change fails as a whole.
    async fn persist_local(&self, events: &[CrdtEvent], timestamp: i64) -> Result<(), EngineError> {
        if events.is_empty() {
            return Ok(());
        }
        self.events.insert_events(events).await?;

        let Some(outbox) = &self.outbox else {
            return Ok(());
        };
        if let Err(e) = outbox.append_local(events, timestamp).await {
            let ids: Vec<String> = events.iter().map(|event| event.event_id.clone()).collect();
            if let Err(rollback) = self.events.delete_events_by_ids(&ids).await {
                tracing::warn!(error = %rollback, "failed to roll back events after outbox failure");
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Re-enqueue local events that reached the event log but not the outbox
    ///
    /// Peers learn this replica's counter for an object only from the
    /// operations shipped for it, and local counters per object only grow.
    /// A stored event whose local counter is past the highest shipped one
    /// for its object was therefore recorded here and never shipped.
    pub async fn recover_unshipped(&self) -> Result<usize, EngineError> {
        let Some(outbox) = &self.outbox else {
            return Ok(0);
        };
        let _guard = self.write_lock.lock().await;

        let shipped = outbox.shipped_counters().await;
        let unshipped: Vec<CrdtEvent> = self
            .events
            .all_events()
            .await?
            .into_iter()
            .filter(|event| {
                let counter = event.clock.get(&self.replica_id);
                counter > shipped.get(&event.object_id).copied().unwrap_or(0)
            })
            .collect();
        if unshipped.is_empty() {
            return Ok(0);
        }

        outbox
            .append_local(&unshipped, self.clock.now_millis())
            .await?;
        tracing::warn!(count = unshipped.len(), "re-enqueued events missing from the outbox");
        Ok(unshipped.len())
    }

    /// Store a remote event; returns `false` when it was already known
    pub async fn apply_event(&self, event: &CrdtEvent) -> Result<bool, EngineError> {
        Ok(self.events.insert_event(event).await?)
    }

    /// Store remote events; returns how many were new
    pub async fn apply_events(&self, events: &[CrdtEvent]) -> Result<usize, EngineError> {
        let inserted = self.events.insert_events(events).await?;
        tracing::debug!(received = events.len(), inserted, "applied remote events");
        Ok(inserted)
    }

    /// Collapse every event for an object into its current state
    ///
    /// Returns `None` when nothing is known about the object.
    pub async fn merge_events_for_object(
        &self,
        object_id: &str,
    ) -> Result<Option<MergedState>, EngineError> {
        let events = self.events.events_for_object(object_id).await?;
        let object_type = match events.first() {
            Some(event) => event.object_type,
            None => match self.entities.object_type_of(object_id).await? {
                Some(object_type) => object_type,
                None => return Ok(None),
            },
        };

        if let Some(merged_clock) = self.deletion_clock(object_type, object_id, &events).await? {
            return Ok(Some(MergedState {
                object_id: object_id.to_string(),
                object_type,
                documents: BTreeMap::new(),
                merged_clock,
                is_deleted: true,
            }));
        }

        let snapshot = self.entities.snapshot(object_type, object_id).await?;
        if events.is_empty() && snapshot.is_empty() {
            return Ok(None);
        }

        let mut documents: BTreeMap<FileTarget, BTreeMap<String, ResolvedValue>> = BTreeMap::new();
        for (file, doc) in &snapshot.documents {
            let fields = documents.entry(*file).or_default();
            for (field, value) in &doc.fields {
                fields.insert(
                    field.clone(),
                    ResolvedValue {
                        field: field.clone(),
                        value: value.clone(),
                        winning_clock: doc.field_clock(field).clone(),
                    },
                );
            }
        }

        let mut groups: BTreeMap<(FileTarget, &str), Vec<CrdtEvent>> = BTreeMap::new();
        let mut merged_clock = snapshot.clock();
        for event in events.iter().filter(|event| !event.is_delete()) {
            merged_clock = merged_clock.merge(&event.clock);
            groups
                .entry((event.file, event.field.as_str()))
                .or_default()
                .push(event.clone());
        }

        for ((file, field), group) in groups {
            let winner = resolve_field_from_events(&group);
            let fields = documents.entry(file).or_default();
            let replaces = match fields.get(field) {
                Some(baseline) => {
                    VectorClock::resolution_cmp(&winner.winning_clock, &baseline.winning_clock)
                        == Ordering::Greater
                }
                None => true,
            };
            if replaces {
                fields.insert(field.to_string(), winner);
            }
        }

        Ok(Some(MergedState {
            object_id: object_id.to_string(),
            object_type,
            documents,
            merged_clock,
            is_deleted: false,
        }))
    }

    /// Join of the DELETE event clocks and the tombstone clock, or `None`
    /// while the object is live
    ///
    /// System entities are never deleted; DELETE events for them are
    /// ignored.
    async fn deletion_clock(
        &self,
        object_type: ObjectType,
        object_id: &str,
        events: &[CrdtEvent],
    ) -> Result<Option<VectorClock>, EngineError> {
        if is_system_entity(object_type, object_id) {
            if events.iter().any(CrdtEvent::is_delete) {
                tracing::warn!(object_id, "ignoring DELETE event for system entity");
            }
            return Ok(None);
        }
        let mut deleted = false;
        let mut clock = VectorClock::new();
        for event in events.iter().filter(|event| event.is_delete()) {
            deleted = true;
            clock = clock.merge(&event.clock);
        }

        if self.entities.is_deleted(object_type, object_id).await? {
            deleted = true;
            match self.entities.read_tombstone(object_type, object_id).await {
                Ok(Some(tombstone)) => clock = clock.merge(&tombstone.clock),
                Ok(None) => {}
                Err(e) if e.is_corruption() => {
                    tracing::warn!(object_id, error = %e, "corrupt tombstone, ignoring its clock");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(deleted.then_some(clock))
    }

    pub async fn events_for_object(&self, object_id: &str) -> Result<Vec<CrdtEvent>, EngineError> {
        Ok(self.events.events_for_object(object_id).await?)
    }

    /// Every event still held in the log
    pub async fn pending_events(&self) -> Result<Vec<CrdtEvent>, EngineError> {
        Ok(self.events.all_events().await?)
    }

    pub async fn events_after_timestamp(
        &self,
        timestamp: i64,
    ) -> Result<Vec<CrdtEvent>, EngineError> {
        Ok(self.events.events_after_timestamp(timestamp).await?)
    }

    pub async fn event_count(&self) -> Result<u64, EngineError> {
        Ok(self.events.event_count().await?)
    }

    pub async fn object_ids_with_events(&self) -> Result<Vec<String>, EngineError> {
        Ok(self.events.object_ids_with_events().await?)
    }

    pub async fn has_delete_event(&self, object_id: &str) -> Result<bool, EngineError> {
        let events = self.events.events_for_object(object_id).await?;
        Ok(events.iter().any(CrdtEvent::is_delete))
    }
}

#[cfg(test)]
#[path = "crdt_tests.rs"]
mod tests;
