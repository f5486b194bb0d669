// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local query cache
//!
//! A derived index over the JSON snapshot used for listing and relation
//! lookups. It can always be rebuilt from disk.

use crate::StorageError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use yaba_core::entity::fields;
use yaba_core::{FieldValue, ObjectType};

/// Cached primary-document fields of one entity
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub object_type: ObjectType,
    pub id: String,
    pub fields: BTreeMap<String, FieldValue>,
}

impl CacheEntry {
    pub fn new(object_type: ObjectType, id: impl Into<String>) -> Self {
        Self {
            object_type,
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(FieldValue::as_str)
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.text(fields::PARENT_ID)
    }

    pub fn folder_id(&self) -> Option<&str> {
        self.text(fields::FOLDER_ID)
    }

    pub fn bookmark_id(&self) -> Option<&str> {
        self.text(fields::BOOKMARK_ID)
    }
}

#[async_trait]
pub trait LocalCache: Clone + Send + Sync + 'static {
    async fn upsert(&self, entry: CacheEntry) -> Result<(), StorageError>;

    /// Returns whether an entry was removed
    async fn remove(&self, object_type: ObjectType, id: &str) -> Result<bool, StorageError>;

    async fn get(&self, object_type: ObjectType, id: &str)
        -> Result<Option<CacheEntry>, StorageError>;

    async fn ids(&self, object_type: ObjectType) -> Result<Vec<String>, StorageError>;

    /// Direct child folders of a folder
    async fn folder_children(&self, parent_id: &str) -> Result<Vec<String>, StorageError>;

    async fn bookmarks_in_folder(&self, folder_id: &str) -> Result<Vec<String>, StorageError>;

    async fn highlights_for_bookmark(&self, bookmark_id: &str)
        -> Result<Vec<String>, StorageError>;

    async fn clear(&self) -> Result<(), StorageError>;
}

/// In-process cache
#[derive(Clone, Default)]
pub struct MemoryCache {
    entries: Arc<Mutex<BTreeMap<(ObjectType, String), CacheEntry>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn ids_where(&self, object_type: ObjectType, pred: impl Fn(&CacheEntry) -> bool) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|entry| entry.object_type == object_type && pred(entry))
            .map(|entry| entry.id.clone())
            .collect()
    }
}

#[async_trait]
impl LocalCache for MemoryCache {
    async fn upsert(&self, entry: CacheEntry) -> Result<(), StorageError> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert((entry.object_type, entry.id.clone()), entry);
        Ok(())
    }

    async fn remove(&self, object_type: ObjectType, id: &str) -> Result<bool, StorageError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&(object_type, id.to_string()))
            .is_some())
    }

    async fn get(
        &self,
        object_type: ObjectType,
        id: &str,
    ) -> Result<Option<CacheEntry>, StorageError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(object_type, id.to_string()))
            .cloned())
    }

    async fn ids(&self, object_type: ObjectType) -> Result<Vec<String>, StorageError> {
        Ok(self.ids_where(object_type, |_| true))
    }

    async fn folder_children(&self, parent_id: &str) -> Result<Vec<String>, StorageError> {
        Ok(self.ids_where(ObjectType::Folder, |e| e.parent_id() == Some(parent_id)))
    }

    async fn bookmarks_in_folder(&self, folder_id: &str) -> Result<Vec<String>, StorageError> {
        Ok(self.ids_where(ObjectType::Bookmark, |e| e.folder_id() == Some(folder_id)))
    }

    async fn highlights_for_bookmark(
        &self,
        bookmark_id: &str,
    ) -> Result<Vec<String>, StorageError> {
        Ok(self.ids_where(ObjectType::Highlight, |e| {
            e.bookmark_id() == Some(bookmark_id)
        }))
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        Ok(())
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
