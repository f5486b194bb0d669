// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON entity snapshot storage
//!
//! Layout under the root directory:
//!
//! ```text
//! folders/<id>/meta.json            tags/<id>/meta.json
//! bookmarks/<id>/meta.json          highlights/<id>/highlight.json
//! bookmarks/<id>/link.json          <type>/<id>/deleted.json (tombstone)
//! bookmarks/<id>/content/
//! ```

use crate::StorageError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use yaba_core::{EntityDocument, FileTarget, ObjectType, Tombstone, VectorClock};

const TOMBSTONE_FILE: &str = "deleted.json";
const CONTENT_DIR: &str = "content";

/// Readable documents of one entity plus any that failed to parse
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntitySnapshot {
    pub documents: BTreeMap<FileTarget, EntityDocument>,
    pub corrupted: Vec<PathBuf>,
}

impl EntitySnapshot {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Join of all document clocks; empty when no document is readable
    pub fn clock(&self) -> VectorClock {
        self.documents
            .values()
            .fold(VectorClock::new(), |acc, doc| acc.merge(&doc.clock))
    }
}

/// Read/write access to on-disk entity documents
#[async_trait]
pub trait EntityStore: Clone + Send + Sync + 'static {
    /// `Ok(None)` when absent, `Err(Corrupted)` when unparseable
    async fn read_document(
        &self,
        object_type: ObjectType,
        id: &str,
        file: FileTarget,
    ) -> Result<Option<EntityDocument>, StorageError>;

    async fn write_document(
        &self,
        object_type: ObjectType,
        file: FileTarget,
        document: &EntityDocument,
    ) -> Result<(), StorageError>;

    /// All documents of an entity; corrupt ones are listed, not returned
    async fn snapshot(
        &self,
        object_type: ObjectType,
        id: &str,
    ) -> Result<EntitySnapshot, StorageError> {
        let mut snapshot = EntitySnapshot::default();
        for file in object_type.documents() {
            match self.read_document(object_type, id, *file).await {
                Ok(Some(doc)) => {
                    snapshot.documents.insert(*file, doc);
                }
                Ok(None) => {}
                Err(StorageError::Corrupted { path, reason }) => {
                    tracing::warn!(path = %path.display(), %reason, "skipping corrupt document");
                    snapshot.corrupted.push(path);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(snapshot)
    }

    async fn snapshot_clock(
        &self,
        object_type: ObjectType,
        id: &str,
    ) -> Result<VectorClock, StorageError> {
        Ok(self.snapshot(object_type, id).await?.clock())
    }

    /// Tombstone present. Decided by file existence so a corrupt tombstone
    /// still counts as deleted.
    async fn is_deleted(&self, object_type: ObjectType, id: &str) -> Result<bool, StorageError>;

    async fn read_tombstone(
        &self,
        object_type: ObjectType,
        id: &str,
    ) -> Result<Option<Tombstone>, StorageError>;

    async fn write_tombstone(
        &self,
        object_type: ObjectType,
        tombstone: &Tombstone,
    ) -> Result<(), StorageError>;

    /// Remove every data document (and bookmark content), keeping the tombstone
    async fn delete_documents(&self, object_type: ObjectType, id: &str)
        -> Result<(), StorageError>;

    /// Ids of every entity directory of a type, deleted ones included
    async fn scan_ids(&self, object_type: ObjectType) -> Result<Vec<String>, StorageError>;

    /// Which type directory holds `id`, if any
    async fn object_type_of(&self, id: &str) -> Result<Option<ObjectType>, StorageError>;
}

/// Entity store over a directory tree of JSON files
#[derive(Clone, Debug)]
pub struct FileEntityStore {
    root: PathBuf,
}

impl FileEntityStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entity_dir(&self, object_type: ObjectType, id: &str) -> Result<PathBuf, StorageError> {
        validate_id(id)?;
        Ok(self.root.join(object_type.dir_name()).join(id))
    }

    pub fn document_path(
        &self,
        object_type: ObjectType,
        id: &str,
        file: FileTarget,
    ) -> Result<PathBuf, StorageError> {
        Ok(self.entity_dir(object_type, id)?.join(file.file_name()))
    }

    pub fn tombstone_path(&self, object_type: ObjectType, id: &str) -> Result<PathBuf, StorageError> {
        Ok(self.entity_dir(object_type, id)?.join(TOMBSTONE_FILE))
    }
}

/// Ids become directory names, so separators and dot segments are refused.
fn validate_id(id: &str) -> Result<(), StorageError> {
    let bad = id.is_empty()
        || id == "."
        || id == ".."
        || id.contains(['/', '\\', '\0']);
    if bad {
        return Err(StorageError::InvalidId(id.to_string()));
    }
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| StorageError::Corrupted {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// Write through a temp file so readers never see a partial document
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, json)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<(), StorageError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl EntityStore for FileEntityStore {
    async fn read_document(
        &self,
        object_type: ObjectType,
        id: &str,
        file: FileTarget,
    ) -> Result<Option<EntityDocument>, StorageError> {
        read_json(&self.document_path(object_type, id, file)?)
    }

    async fn write_document(
        &self,
        object_type: ObjectType,
        file: FileTarget,
        document: &EntityDocument,
    ) -> Result<(), StorageError> {
        write_json(&self.document_path(object_type, &document.id, file)?, document)
    }

    async fn is_deleted(&self, object_type: ObjectType, id: &str) -> Result<bool, StorageError> {
        Ok(self.tombstone_path(object_type, id)?.exists())
    }

    async fn read_tombstone(
        &self,
        object_type: ObjectType,
        id: &str,
    ) -> Result<Option<Tombstone>, StorageError> {
        read_json(&self.tombstone_path(object_type, id)?)
    }

    async fn write_tombstone(
        &self,
        object_type: ObjectType,
        tombstone: &Tombstone,
    ) -> Result<(), StorageError> {
        write_json(&self.tombstone_path(object_type, &tombstone.id)?, tombstone)
    }

    async fn delete_documents(
        &self,
        object_type: ObjectType,
        id: &str,
    ) -> Result<(), StorageError> {
        let dir = self.entity_dir(object_type, id)?;
        for file in object_type.documents() {
            remove_if_exists(&dir.join(file.file_name()))?;
        }
        let content = dir.join(CONTENT_DIR);
        if content.is_dir() {
            fs::remove_dir_all(&content)?;
        }
        Ok(())
    }

    async fn scan_ids(&self, object_type: ObjectType) -> Result<Vec<String>, StorageError> {
        let dir = self.root.join(object_type.dir_name());
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                ids.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn object_type_of(&self, id: &str) -> Result<Option<ObjectType>, StorageError> {
        for object_type in ObjectType::ALL {
            if self.entity_dir(object_type, id)?.is_dir() {
                return Ok(Some(object_type));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
#[path = "entity_store_tests.rs"]
mod tests;
