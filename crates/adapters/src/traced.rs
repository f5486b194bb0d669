// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced transport wrapper for consistent observability

use crate::transport::{PeerTransport, TransportError};
use async_trait::async_trait;
use tracing::Instrument;
use yaba_core::ReplicaId;

/// Wrapper that adds tracing to any PeerTransport
#[derive(Clone)]
pub struct TracedTransport<T> {
    inner: T,
}

impl<T> TracedTransport<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: PeerTransport> PeerTransport for TracedTransport<T> {
    async fn exchange(
        &self,
        peer: &ReplicaId,
        request: Vec<u8>,
    ) -> Result<Vec<u8>, TransportError> {
        let span = tracing::info_span!("transport.exchange", %peer);

        async move {
            tracing::debug!(request_bytes = request.len(), "sending");

            let start = std::time::Instant::now();
            let result = self.inner.exchange(peer, request).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match &result {
                Ok(body) => tracing::info!(elapsed_ms, response_bytes = body.len(), "exchanged"),
                Err(e) if e.is_retryable() => {
                    tracing::warn!(elapsed_ms, error = %e, "exchange failed (retryable)")
                }
                Err(e) => tracing::error!(elapsed_ms, error = %e, "exchange failed"),
            }

            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
