// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk entity snapshot documents and tombstones

use crate::event::{FieldValue, ObjectType};
use crate::vector_clock::VectorClock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Folder every bookmark falls back to. Never deleted.
pub const UNCATEGORIZED_FOLDER_ID: &str = "00000000-0000-4000-8000-000000000001";
/// Built-in "Pinned" tag. Never deleted.
pub const PINNED_TAG_ID: &str = "00000000-0000-4000-8000-000000000101";
/// Built-in "Private" tag. Never deleted.
pub const PRIVATE_TAG_ID: &str = "00000000-0000-4000-8000-000000000102";

/// Fields linking entities together in the query cache.
pub mod fields {
    pub const PARENT_ID: &str = "parentId";
    pub const FOLDER_ID: &str = "folderId";
    pub const BOOKMARK_ID: &str = "bookmarkId";
}

/// Whether `id` names a built-in entity exempt from deletion.
pub fn is_system_entity(object_type: ObjectType, id: &str) -> bool {
    match object_type {
        ObjectType::Folder => id == UNCATEGORIZED_FOLDER_ID,
        ObjectType::Tag => id == PINNED_TAG_ID || id == PRIVATE_TAG_ID,
        ObjectType::Bookmark | ObjectType::Highlight => false,
    }
}

/// One JSON document of an entity (meta.json, link.json, highlight.json).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDocument {
    pub id: String,
    /// Join of every write reflected in this document
    pub clock: VectorClock,
    /// Winning clock per field
    #[serde(default)]
    pub field_clocks: BTreeMap<String, VectorClock>,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl EntityDocument {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Clock of the write a field currently reflects.
    ///
    /// Documents written without per-field clocks fall back to the document
    /// clock.
    pub fn field_clock(&self, field: &str) -> &VectorClock {
        self.field_clocks.get(field).unwrap_or(&self.clock)
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }
}

/// Contents of `deleted.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tombstone {
    pub id: String,
    pub deleted: bool,
    pub clock: VectorClock,
}

impl Tombstone {
    pub fn new(id: impl Into<String>, clock: VectorClock) -> Self {
        Self {
            id: id.into(),
            deleted: true,
            clock,
        }
    }
}

#[cfg(test)]
#[path = "entity_tests.rs"]
mod tests;
