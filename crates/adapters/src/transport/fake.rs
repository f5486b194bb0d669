// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake transport for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{PeerTransport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use yaba_core::ReplicaId;

/// Recorded exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportCall {
    pub peer: ReplicaId,
    pub request: Vec<u8>,
}

/// Transport answering from a script of queued replies
///
/// With an empty script every exchange fails as unreachable.
#[derive(Clone, Default)]
pub struct FakeTransport {
    script: Arc<Mutex<VecDeque<Result<Vec<u8>, TransportError>>>>,
    delay: Arc<Mutex<Option<Duration>>>,
    calls: Arc<Mutex<Vec<TransportCall>>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, body: Vec<u8>) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Ok(body));
    }

    pub fn push_failure(&self, error: TransportError) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Err(error));
    }

    /// Delay every reply, e.g. to trip request timeouts
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap_or_else(|e| e.into_inner()) = Some(delay);
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl PeerTransport for FakeTransport {
    async fn exchange(
        &self,
        peer: &ReplicaId,
        request: Vec<u8>,
    ) -> Result<Vec<u8>, TransportError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(TransportCall {
                peer: peer.clone(),
                request,
            });

        let delay = *self.delay.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Unreachable(peer.to_string())))
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
