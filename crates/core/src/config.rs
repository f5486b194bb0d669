// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Replica configuration
//!
//! Loaded from TOML. Every section is optional; missing keys take the
//! defaults below.

use crate::ids::ReplicaId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default event count above which the log is compacted.
pub const DEFAULT_MAX_EVENT_COUNT: u64 = 10_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Log compaction policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactionConfig {
    pub max_event_count: u64,
    /// Compact after applying remote operations
    pub compact_on_sync: bool,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            max_event_count: DEFAULT_MAX_EVENT_COUNT,
            compact_on_sync: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Upper bound on one request/response exchange
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    pub max_operations_per_response: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_operations_per_response: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicaConfig {
    pub data_dir: PathBuf,
    /// Generated and persisted under `data_dir` when unset
    pub replica_id: Option<ReplicaId>,
    pub compaction: CompactionConfig,
    pub sync: SyncConfig,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            replica_id: None,
            compaction: CompactionConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl ReplicaConfig {
    /// Defaults rooted at `data_dir`.
    pub fn for_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_replica_id(mut self, replica_id: impl Into<ReplicaId>) -> Self {
        self.replica_id = Some(replica_id.into());
        self
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), data_dir = %config.data_dir.display(), "loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.compaction.max_event_count == 0 {
            return Err(ConfigError::Invalid(
                "compaction.max_event_count must be positive".to_string(),
            ));
        }
        if self.sync.max_operations_per_response == 0 {
            return Err(ConfigError::Invalid(
                "sync.max_operations_per_response must be positive".to_string(),
            ));
        }
        if self.sync.request_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "sync.request_timeout must be positive".to_string(),
            ));
        }
        if let Some(id) = &self.replica_id {
            if id.as_str().trim().is_empty() {
                return Err(ConfigError::Invalid("replica_id is empty".to_string()));
            }
        }
        Ok(())
    }

    pub fn entities_dir(&self) -> PathBuf {
        self.data_dir.join("entities")
    }

    pub fn events_path(&self) -> PathBuf {
        self.data_dir.join("events.jsonl")
    }

    pub fn sync_dir(&self) -> PathBuf {
        self.data_dir.join("sync")
    }
}

/// `$XDG_DATA_HOME/yaba`, falling back to the working directory.
fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("yaba"))
        .unwrap_or_else(|| PathBuf::from(".yaba"))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
