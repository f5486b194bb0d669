// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::transport::FakeTransport;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

/// A writer that captures log output for testing
#[derive(Clone, Default)]
struct CapturedLogs {
    logs: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    fn contents(&self) -> String {
        let logs = self.logs.lock().unwrap();
        String::from_utf8_lossy(&logs).to_string()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.logs.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run a future with captured tracing output
fn with_tracing<F, Fut>(f: F) -> (String, Fut::Output)
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future,
{
    let logs = CapturedLogs::default();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_writer(logs.clone())
        .with_ansi(false)
        .without_time()
        .finish();

    let result = tracing::subscriber::with_default(subscriber, || {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(f())
    });

    (logs.contents(), result)
}

#[test]
fn successful_exchange_logs_timing_and_sizes() {
    let fake = FakeTransport::new();
    fake.push_response(b"pong".to_vec());
    let traced = TracedTransport::new(fake);
    let peer = ReplicaId::from("laptop");

    let (logs, result) = with_tracing(|| traced.exchange(&peer, b"ping".to_vec()));

    assert_eq!(result.unwrap(), b"pong");
    assert!(logs.contains("transport.exchange"), "logs: {logs}");
    assert!(logs.contains("peer=laptop"), "logs: {logs}");
    assert!(logs.contains("request_bytes=4"), "logs: {logs}");
    assert!(logs.contains("response_bytes=4"), "logs: {logs}");
    assert!(logs.contains("elapsed_ms"), "logs: {logs}");
}

#[test]
fn retryable_failure_logs_warning() {
    let traced = TracedTransport::new(FakeTransport::new());
    let peer = ReplicaId::from("phone");

    let (logs, result) = with_tracing(|| traced.exchange(&peer, Vec::new()));

    assert!(result.is_err());
    assert!(logs.contains("WARN"), "logs: {logs}");
    assert!(logs.contains("retryable"), "logs: {logs}");
}

#[test]
fn rejection_logs_error() {
    let fake = FakeTransport::new();
    fake.push_failure(TransportError::Rejected {
        peer: "phone".to_string(),
        reason: "bad request".to_string(),
    });
    let traced = TracedTransport::new(fake);
    let peer = ReplicaId::from("phone");

    let (logs, result) = with_tracing(|| traced.exchange(&peer, Vec::new()));

    assert!(matches!(result, Err(TransportError::Rejected { .. })));
    assert!(logs.contains("ERROR"), "logs: {logs}");
    assert!(logs.contains("bad request"), "logs: {logs}");
}

#[tokio::test]
async fn wrapper_passes_through_to_inner() {
    let fake = FakeTransport::new();
    fake.push_response(b"ok".to_vec());
    let traced = TracedTransport::new(fake.clone());

    traced
        .exchange(&ReplicaId::from("laptop"), b"x".to_vec())
        .await
        .unwrap();
    assert_eq!(fake.calls().len(), 1);
    assert_eq!(traced.inner().calls().len(), 1);
}
