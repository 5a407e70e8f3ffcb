//! Instrumented cache and upstream doubles shared by unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::cache::{CacheError, CacheStore, MemoryCache};
use crate::coordinator::RequestEnvelope;
use crate::upstream::{Upstream, UpstreamError};

pub(crate) fn envelope(call: &str, pagina: u64) -> RequestEnvelope {
    serde_json::from_value(serde_json::json!({
        "call": call,
        "param": [{ "pagina": pagina }],
        "url": "geral/clientes/"
    }))
    .unwrap()
}

/// Memory-backed store that records writes and can be told to fail.
#[derive(Default)]
pub(crate) struct RecordingCache {
    inner: MemoryCache,
    fail_reads: bool,
    fail_writes: bool,
    reads: AtomicUsize,
    writes: Mutex<Vec<(String, Bytes, Duration)>>,
}

impl RecordingCache {
    pub fn failing_reads() -> Self {
        Self {
            fail_reads: true,
            ..Self::default()
        }
    }

    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> Vec<(String, Bytes, Duration)> {
        self.writes.lock().unwrap().clone()
    }

    pub async fn seed(&self, key: &str, value: &'static [u8]) {
        self.inner
            .set(key, Bytes::from_static(value), Duration::from_secs(60))
            .await
            .unwrap();
    }
}

#[async_trait]
impl CacheStore for RecordingCache {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads {
            return Err(CacheError::Unavailable("connection refused".to_owned()));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        if self.fail_writes {
            return Err(CacheError::Unavailable("read-only replica".to_owned()));
        }
        self.writes
            .lock()
            .unwrap()
            .push((key.to_owned(), value.clone(), ttl));
        self.inner.set(key, value, ttl).await
    }
}

/// Upstream that answers with a fixed outcome and counts calls.
pub(crate) struct CountingUpstream {
    calls: AtomicUsize,
    status: Option<u16>,
    body: Bytes,
    delay: Duration,
}

impl CountingUpstream {
    pub fn ok(body: &'static [u8]) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            status: None,
            body: Bytes::from_static(body),
            delay: Duration::ZERO,
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            status: Some(status),
            ..Self::ok(b"")
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Upstream for CountingUpstream {
    async fn invoke(&self, _envelope: &RequestEnvelope) -> Result<Bytes, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.status {
            Some(status) => Err(UpstreamError::Status { status }),
            None => Ok(self.body.clone()),
        }
    }
}
