// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CRDT event model
//!
//! A [`CrdtEvent`] records one field mutation on one entity document. Events
//! are immutable once created; the merged view of an entity is derived by
//! replaying them.

use crate::vector_clock::VectorClock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Field name carried by DELETE events.
pub const DELETED_FIELD: &str = "_deleted";

/// Kind of entity an event targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectType {
    Folder,
    Tag,
    Bookmark,
    Highlight,
}

impl ObjectType {
    pub const ALL: [ObjectType; 4] = [
        ObjectType::Folder,
        ObjectType::Tag,
        ObjectType::Bookmark,
        ObjectType::Highlight,
    ];

    /// Directory holding entities of this type.
    pub fn dir_name(self) -> &'static str {
        match self {
            ObjectType::Folder => "folders",
            ObjectType::Tag => "tags",
            ObjectType::Bookmark => "bookmarks",
            ObjectType::Highlight => "highlights",
        }
    }

    /// Documents that make up an entity of this type.
    pub fn documents(self) -> &'static [FileTarget] {
        match self {
            ObjectType::Folder | ObjectType::Tag => &[FileTarget::Meta],
            ObjectType::Bookmark => &[FileTarget::Meta, FileTarget::Link],
            ObjectType::Highlight => &[FileTarget::Highlight],
        }
    }

    /// The document that carries the entity's identity fields.
    pub fn primary_document(self) -> FileTarget {
        match self {
            ObjectType::Highlight => FileTarget::Highlight,
            _ => FileTarget::Meta,
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectType::Folder => "folder",
            ObjectType::Tag => "tag",
            ObjectType::Bookmark => "bookmark",
            ObjectType::Highlight => "highlight",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Create,
    Update,
    Delete,
}

/// JSON document an event writes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileTarget {
    Meta,
    Link,
    Highlight,
}

impl FileTarget {
    pub fn file_name(self) -> &'static str {
        match self {
            FileTarget::Meta => "meta.json",
            FileTarget::Link => "link.json",
            FileTarget::Highlight => "highlight.json",
        }
    }
}

/// Value carried by a field mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

/// One atomic field mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrdtEvent {
    pub event_id: String,
    pub object_id: String,
    pub object_type: ObjectType,
    pub kind: EventKind,
    pub file: FileTarget,
    pub field: String,
    pub value: FieldValue,
    pub clock: VectorClock,
    /// Wall-clock milliseconds; never used for resolution
    pub timestamp: i64,
}

impl CrdtEvent {
    pub fn is_delete(&self) -> bool {
        self.kind == EventKind::Delete
    }
}

/// Winning value for one field.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedValue {
    pub field: String,
    pub value: FieldValue,
    pub winning_clock: VectorClock,
}

/// Derived view of all events for one object.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedState {
    pub object_id: String,
    pub object_type: ObjectType,
    /// Resolved fields per document; empty for deleted objects
    pub documents: BTreeMap<FileTarget, BTreeMap<String, ResolvedValue>>,
    pub merged_clock: VectorClock,
    pub is_deleted: bool,
}

impl MergedState {
    pub fn value(&self, file: FileTarget, field: &str) -> Option<&FieldValue> {
        self.documents
            .get(&file)
            .and_then(|fields| fields.get(field))
            .map(|resolved| &resolved.value)
    }

    /// Plain field map for one document.
    pub fn fields(&self, file: FileTarget) -> BTreeMap<String, FieldValue> {
        self.documents
            .get(&file)
            .map(|fields| {
                fields
                    .iter()
                    .map(|(name, resolved)| (name.clone(), resolved.value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
