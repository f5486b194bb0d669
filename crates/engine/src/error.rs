// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the replication engine

use thiserror::Error;
use yaba_adapters::TransportError;
use yaba_core::{CodecError, ConfigError, ObjectType, ReplicaId};
use yaba_storage::StorageError;

/// Errors that can occur in the engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("{object_type} {id} is deleted")]
    EntityDeleted { object_type: ObjectType, id: String },
    #[error("{object_type} {id} not found")]
    EntityNotFound { object_type: ObjectType, id: String },
    #[error("field {0} is reserved for deletes")]
    ReservedField(String),
    #[error("sync with {peer} timed out")]
    Timeout { peer: ReplicaId },
    #[error("data directory {0} is in use by another process")]
    Locked(String),
}

impl EngineError {
    /// Whether retrying the same call later may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Transport(e) => e.is_retryable(),
            EngineError::Timeout { .. } | EngineError::Locked(_) => true,
            EngineError::Storage(StorageError::Io(_)) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
