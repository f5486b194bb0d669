// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pull-based sync
//!
//! Each replica ships only the operations it originated, in `origin_seq`
//! order. A puller sends its cursors, the peer answers with everything past
//! the puller's cursor for that peer, and the puller applies the batch
//! exactly once per operation before advancing and persisting its cursor.

use crate::{
    CompactionReport, CrdtEngine, EngineError, FileSystemStateManager, LogCompaction,
    MaterializeSummary, Materializer,
};
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use tracing::Instrument;
use yaba_adapters::PeerTransport;
use yaba_core::sync::{decode, encode};
use yaba_core::{
    Clock, IdGen, ReplicaId, SyncConfig, SyncRequest, SyncResponse, SyncState,
};
use yaba_storage::{EntityStore, EventStore, LocalCache, OperationLog};

/// How [`SyncEngine::sync`] reconciles local state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Clear the cache and rebuild it from disk
    FullRefresh,
    /// Merge every object with events and write the result to disk
    IncrementalMerge,
}

/// Result of applying one or more sync responses
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub applied: usize,
    /// Already applied, or our own operations echoed back
    pub skipped: usize,
    pub objects_materialized: usize,
    pub compaction: Option<CompactionReport>,
    /// The peer has more operations past this batch
    pub has_more: bool,
}

impl SyncOutcome {
    fn absorb(&mut self, other: SyncOutcome) {
        self.applied += other.applied;
        self.skipped += other.skipped;
        self.objects_materialized += other.objects_materialized;
        self.has_more = other.has_more;
        if other.compaction.is_some() {
            self.compaction = other.compaction;
        }
    }
}

/// Collaborators of the sync engine
pub struct SyncDeps<E, F, L, C, I> {
    pub engine: CrdtEngine<E, F, C, I>,
    pub outbox: OperationLog,
    pub materializer: Materializer<E, F, L, C, I>,
    pub compaction: LogCompaction<E, F>,
    pub state: Arc<FileSystemStateManager<F, L>>,
}

#[derive(Clone)]
pub struct SyncEngine<E, F, L, C, I> {
    engine: CrdtEngine<E, F, C, I>,
    outbox: OperationLog,
    materializer: Materializer<E, F, L, C, I>,
    compaction: LogCompaction<E, F>,
    state: Arc<FileSystemStateManager<F, L>>,
    config: SyncConfig,
    compact_on_sync: bool,
}

impl<E, F, L, C, I> SyncEngine<E, F, L, C, I>
where
    E: EventStore,
    F: EntityStore,
    L: LocalCache,
    C: Clock,
    I: IdGen,
{
    pub fn new(deps: SyncDeps<E, F, L, C, I>, config: SyncConfig, compact_on_sync: bool) -> Self {
        Self {
            engine: deps.engine,
            outbox: deps.outbox,
            materializer: deps.materializer,
            compaction: deps.compaction,
            state: deps.state,
            config,
            compact_on_sync,
        }
    }

    fn local(&self) -> &ReplicaId {
        self.engine.replica_id()
    }

    pub async fn prepare_sync_request(&self) -> SyncRequest {
        SyncRequest {
            replica_id: self.local().clone(),
            cursors: self.outbox.cursors().await,
        }
    }

    /// Local operations the requester has not seen yet
    pub async fn prepare_sync_response(&self, request: &SyncRequest) -> SyncResponse {
        let after = request.cursors.get(self.local()).copied().unwrap_or(0);
        let (operations, has_more) = self
            .outbox
            .operations_after(after, self.config.max_operations_per_response)
            .await;
        tracing::debug!(
            requester = %request.replica_id,
            after,
            operations = operations.len(),
            has_more,
            "prepared sync response"
        );
        SyncResponse {
            replica_id: self.local().clone(),
            operations,
            has_more,
        }
    }

    /// Serve one encoded [`SyncRequest`]
    pub async fn handle_request(&self, request: &[u8]) -> Result<Vec<u8>, EngineError> {
        let request: SyncRequest = decode(request)?;
        let response = self.prepare_sync_response(&request).await;
        Ok(encode(&response)?)
    }

    /// Apply a peer's operations exactly once each
    ///
    /// Cursors are persisted even when an operation fails, so the next pull
    /// resumes after the last applied one. Every touched object is then
    /// materialized.
    pub async fn apply_sync_response(
        &self,
        response: SyncResponse,
    ) -> Result<SyncOutcome, EngineError> {
        let mut operations = response.operations;
        operations.sort_by(|a, b| {
            a.origin_device_id
                .cmp(&b.origin_device_id)
                .then(a.origin_seq.cmp(&b.origin_seq))
        });

        let mut outcome = SyncOutcome {
            has_more: response.has_more,
            ..SyncOutcome::default()
        };
        let mut affected = BTreeSet::new();
        let mut failure = None;

        for op in &operations {
            if &op.origin_device_id == self.local()
                || op.origin_seq <= self.outbox.cursor(&op.origin_device_id).await
            {
                outcome.skipped += 1;
                continue;
            }
            match self.engine.apply_event(op.event()).await {
                Ok(_) => {
                    self.outbox
                        .advance_cursor(&op.origin_device_id, op.origin_seq)
                        .await;
                    affected.insert(op.event().object_id.clone());
                    outcome.applied += 1;
                }
                Err(e) => {
                    tracing::warn!(op_id = %op.op_id, error = %e, "failed to apply operation");
                    failure = Some(e);
                    break;
                }
            }
        }

        if let Err(e) = self.outbox.persist_cursors().await {
            match failure {
                Some(_) => tracing::warn!(error = %e, "failed to persist cursors"),
                None => return Err(e.into()),
            }
        }

        for object_id in &affected {
            match self.materializer.materialize(object_id).await {
                Ok(_) => outcome.objects_materialized += 1,
                Err(e) if failure.is_some() => {
                    tracing::warn!(%object_id, error = %e, "failed to materialize after sync error")
                }
                Err(e) => return Err(e),
            }
        }

        if let Some(e) = failure {
            return Err(e);
        }

        if self.compact_on_sync && outcome.applied > 0 {
            outcome.compaction = self.compaction.compact_if_needed().await?;
        }

        tracing::info!(
            from = %response.replica_id,
            applied = outcome.applied,
            skipped = outcome.skipped,
            materialized = outcome.objects_materialized,
            "applied sync response"
        );
        Ok(outcome)
    }

    /// Pull everything `peer` has for us
    ///
    /// Each exchange is bounded by the configured request timeout. Status
    /// moves to SYNCING, then IN_SYNC or SYNC_FAILED.
    pub async fn pull_from<T: PeerTransport>(
        &self,
        peer: &ReplicaId,
        transport: &T,
    ) -> Result<SyncOutcome, EngineError> {
        let pull = self
            .pull_batches(peer, transport)
            .instrument(tracing::info_span!("sync.pull", %peer));
        self.tracked("pull", pull).await
    }

    /// Rebuild the cache from disk, then compact if the log is too large
    ///
    /// Returns the number of live entities cached.
    pub async fn full_refresh(&self) -> Result<usize, EngineError> {
        self.tracked("full refresh", async {
            let cached = self.state.full_refresh().await?;
            self.compaction.compact_if_needed().await?;
            Ok(cached)
        })
        .await
    }

    /// Merge every object with events back to disk, then compact if needed
    pub async fn incremental_merge(&self) -> Result<MaterializeSummary, EngineError> {
        self.tracked("incremental merge", async {
            let summary = self.materializer.materialize_all().await?;
            self.compaction.compact_if_needed().await?;
            tracing::info!(live = summary.live, deleted = summary.deleted, "merged pending events");
            Ok(summary)
        })
        .await
    }

    pub async fn sync(&self, mode: SyncMode) -> Result<(), EngineError> {
        match mode {
            SyncMode::FullRefresh => self.full_refresh().await.map(|_| ()),
            SyncMode::IncrementalMerge => self.incremental_merge().await.map(|_| ()),
        }
    }

    /// Repair the cache only when it has drifted from disk
    ///
    /// Returns whether anything was repaired.
    pub async fn sync_if_needed(&self) -> Result<bool, EngineError> {
        let drift = self.state.detect_drift().await?;
        if !drift.has_drift {
            return Ok(false);
        }
        self.state.fix_drift().await?;
        Ok(true)
    }

    /// Run `work` as SYNCING, then IN_SYNC or SYNC_FAILED
    ///
    /// CORRUPTED set while working is left in place.
    async fn tracked<T>(
        &self,
        what: &'static str,
        work: impl Future<Output = Result<T, EngineError>>,
    ) -> Result<T, EngineError> {
        self.state.set_sync_state(SyncState::Syncing);
        let result = work.await;
        match &result {
            Ok(_) if self.state.sync_state() == SyncState::Syncing => {
                self.state.set_sync_state(SyncState::InSync)
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, retryable = e.is_retryable(), "{what} failed");
                self.state.set_sync_state(SyncState::SyncFailed);
            }
        }
        result
    }

    async fn pull_batches<T: PeerTransport>(
        &self,
        peer: &ReplicaId,
        transport: &T,
    ) -> Result<SyncOutcome, EngineError> {
        let mut total = SyncOutcome::default();
        loop {
            let request = encode(&self.prepare_sync_request().await)?;
            let exchange = transport.exchange(peer, request);
            let body = tokio::time::timeout(self.config.request_timeout, exchange)
                .await
                .map_err(|_| EngineError::Timeout { peer: peer.clone() })??;

            let response: SyncResponse = decode(&body)?;
            if &response.replica_id != peer {
                tracing::warn!(expected = %peer, got = %response.replica_id, "response from unexpected replica");
            }

            let batch = self.apply_sync_response(response).await?;
            let progressed = batch.applied + batch.skipped > 0;
            total.absorb(batch);
            if !total.has_more || !progressed {
                break;
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
