// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Entity deletion and tombstones
//!
//! A delete writes the tombstone before any data file is removed, so a
//! crash mid-delete leaves a deleted entity rather than a resurrectable
//! one. The DELETE event recorded afterwards carries the deletion to peers.

use crate::{CrdtEngine, EngineError};
use std::collections::BTreeSet;
use yaba_core::{is_system_entity, Clock, IdGen, ObjectType, Tombstone, VectorClock};
use yaba_storage::{EntityStore, EventStore, LocalCache};

/// How far a local delete of one entity got
enum DeleteProgress {
    Live,
    /// Tombstone written, DELETE event never recorded
    Unfinished(VectorClock),
    Deleted,
}

/// Deletes entities and cascades through folders and bookmarks
#[derive(Clone)]
pub struct DeletionService<E, F, L, C, I> {
    engine: CrdtEngine<E, F, C, I>,
    cache: L,
}

impl<E, F, L, C, I> DeletionService<E, F, L, C, I>
where
    E: EventStore,
    F: EntityStore,
    L: LocalCache,
    C: Clock,
    I: IdGen,
{
    pub fn new(engine: CrdtEngine<E, F, C, I>, cache: L) -> Self {
        Self { engine, cache }
    }

    /// Delete one entity
    ///
    /// Returns `false` for system entities and for entities that are
    /// already deleted. Deleting a bookmark also deletes its highlights.
    /// A tombstone without a DELETE event is an interrupted delete and is
    /// finished here.
    pub async fn delete_entity(
        &self,
        object_type: ObjectType,
        id: &str,
    ) -> Result<bool, EngineError> {
        if is_system_entity(object_type, id) {
            tracing::debug!(%object_type, id, "refusing to delete system entity");
            return Ok(false);
        }
        let resume = match self.progress(object_type, id).await? {
            DeleteProgress::Deleted => return Ok(false),
            DeleteProgress::Live => None,
            DeleteProgress::Unfinished(clock) => Some(clock),
        };

        if object_type == ObjectType::Bookmark {
            for highlight in self.cache.highlights_for_bookmark(id).await? {
                match self.progress(ObjectType::Highlight, &highlight).await? {
                    DeleteProgress::Deleted => {}
                    DeleteProgress::Live => {
                        self.delete_one(ObjectType::Highlight, &highlight, None).await?
                    }
                    DeleteProgress::Unfinished(clock) => {
                        self.delete_one(ObjectType::Highlight, &highlight, Some(clock))
                            .await?
                    }
                }
            }
        }

        self.delete_one(object_type, id, resume).await?;
        Ok(true)
    }

    async fn progress(&self, object_type: ObjectType, id: &str) -> Result<DeleteProgress, EngineError> {
        let entities = self.engine.entity_store();
        if !entities.is_deleted(object_type, id).await? {
            return Ok(DeleteProgress::Live);
        }
        if self.engine.has_delete_event(id).await? {
            return Ok(DeleteProgress::Deleted);
        }
        let clock = match entities.read_tombstone(object_type, id).await {
            Ok(tombstone) => tombstone.map(|t| t.clock).unwrap_or_default(),
            Err(e) if e.is_corruption() => {
                tracing::warn!(%object_type, id, error = %e, "corrupt tombstone, ignoring its clock");
                VectorClock::new()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(DeleteProgress::Unfinished(clock))
    }

    /// Tombstone, documents, DELETE event, cache entry; in that order
    ///
    /// With `resume` set the tombstone is already on disk and its clock
    /// joins the clock the DELETE event is recorded over.
    async fn delete_one(
        &self,
        object_type: ObjectType,
        id: &str,
        resume: Option<VectorClock>,
    ) -> Result<(), EngineError> {
        let entities = self.engine.entity_store();
        let mut current = self.current_clock(object_type, id).await?;
        match resume {
            Some(tombstone_clock) => {
                tracing::info!(%object_type, id, "finishing interrupted delete");
                current = current.merge(&tombstone_clock);
            }
            None => {
                let deletion_clock = current.increment(self.engine.replica_id());
                entities
                    .write_tombstone(object_type, &Tombstone::new(id, deletion_clock))
                    .await?;
            }
        }

        entities.delete_documents(object_type, id).await?;
        let event = self.engine.record_delete(id, object_type, &current).await?;
        self.cache.remove(object_type, id).await?;

        tracing::info!(%object_type, id, clock = %event.clock, "deleted");
        Ok(())
    }

    /// Delete a folder, every descendant folder and every bookmark inside
    ///
    /// Bookmarks go first, then folders children-before-parents. Returns
    /// the number of entities deleted.
    pub async fn delete_folder_cascade(&self, folder_id: &str) -> Result<usize, EngineError> {
        if is_system_entity(ObjectType::Folder, folder_id) {
            return Ok(0);
        }

        let folders = self.collect_folder_tree(folder_id).await?;
        let mut bookmarks = Vec::new();
        for folder in &folders {
            bookmarks.extend(self.cache.bookmarks_in_folder(folder).await?);
        }

        let mut deleted = 0;
        for bookmark in &bookmarks {
            if self.delete_entity(ObjectType::Bookmark, bookmark).await? {
                deleted += 1;
            }
        }
        for folder in folders.iter().rev() {
            if self.delete_entity(ObjectType::Folder, folder).await? {
                deleted += 1;
            }
        }

        tracing::info!(
            folder_id,
            folders = folders.len(),
            bookmarks = bookmarks.len(),
            deleted,
            "cascade delete finished"
        );
        Ok(deleted)
    }

    /// Root first, each folder before its descendants
    async fn collect_folder_tree(&self, root: &str) -> Result<Vec<String>, EngineError> {
        let mut order = Vec::new();
        let mut seen = BTreeSet::new();
        let mut stack = vec![root.to_string()];
        while let Some(folder) = stack.pop() {
            if !seen.insert(folder.clone()) {
                continue;
            }
            let mut children = self.cache.folder_children(&folder).await?;
            children.reverse();
            stack.extend(children);
            order.push(folder);
        }
        Ok(order)
    }

    pub async fn is_entity_deleted(
        &self,
        object_type: ObjectType,
        id: &str,
    ) -> Result<bool, EngineError> {
        Ok(self.engine.entity_store().is_deleted(object_type, id).await?)
    }

    /// Mirror a deletion that arrived from a peer
    ///
    /// Writes or widens the local tombstone and removes the entity's data,
    /// without recording a new event. Returns whether the tombstone changed.
    pub async fn apply_remote_delete(
        &self,
        object_type: ObjectType,
        id: &str,
        clock: &VectorClock,
    ) -> Result<bool, EngineError> {
        if is_system_entity(object_type, id) {
            tracing::warn!(%object_type, id, "ignoring remote delete of system entity");
            return Ok(false);
        }
        let entities = self.engine.entity_store();

        let existing = match entities.read_tombstone(object_type, id).await {
            Ok(tombstone) => tombstone,
            Err(e) if e.is_corruption() => {
                tracing::warn!(%object_type, id, error = %e, "rewriting corrupt tombstone");
                None
            }
            Err(e) => return Err(e.into()),
        };
        let merged = existing
            .as_ref()
            .map_or_else(|| clock.clone(), |tombstone| tombstone.clock.merge(clock));
        let changed = match &existing {
            Some(tombstone) => tombstone.clock != merged,
            None => true,
        };
        if changed {
            entities
                .write_tombstone(object_type, &Tombstone::new(id, merged))
                .await?;
        }

        entities.delete_documents(object_type, id).await?;
        self.cache.remove(object_type, id).await?;
        if changed {
            tracing::info!(%object_type, id, "applied remote delete");
        }
        Ok(changed)
    }

    /// Known clock of an entity: on-disk documents joined with its events
    async fn current_clock(
        &self,
        object_type: ObjectType,
        id: &str,
    ) -> Result<VectorClock, EngineError> {
        let snapshot_clock = self.engine.entity_store().snapshot_clock(object_type, id).await?;
        let events = self.engine.events_for_object(id).await?;
        Ok(events
            .iter()
            .fold(snapshot_clock, |clock, event| clock.merge(&event.clock)))
    }
}

#[cfg(test)]
#[path = "deletion_tests.rs"]
mod tests;
