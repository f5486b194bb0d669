// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage error type

use crate::log::LogReadError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("log read error: {0}")]
    Log(#[from] LogReadError),
    #[error("corrupted record at {path}: {reason}")]
    Corrupted { path: PathBuf, reason: String },
    #[error("invalid entity id: {0:?}")]
    InvalidId(String),
}

impl StorageError {
    pub fn is_corruption(&self) -> bool {
        matches!(self, StorageError::Corrupted { .. })
    }
}
