use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::info;

use super::{CoordinatorError, Processor, RequestEnvelope};

/// Runs every call to the wrapped [`Processor`] inside one critical section.
///
/// Only one envelope is processed at a time, upstream call and cache write
/// included; everyone else queues on the mutex. This trades throughput for
/// never overlapping upstream calls, and request N's cache write is always
/// visible to request N+1's cache read.
///
/// The `locked` flag only picks a log line. It is read before the lock is
/// taken, so it can be stale; exclusion comes from the mutex alone.
pub struct SerializationGate<P> {
    inner: P,
    lock: Mutex<()>,
    locked: AtomicBool,
}

impl<P> SerializationGate<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            lock: Mutex::new(()),
            locked: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

/// Clears the advisory flag on every exit path, unwinding included.
struct Release<'a> {
    locked: &'a AtomicBool,
}

impl Drop for Release<'_> {
    fn drop(&mut self) {
        self.locked.store(false, Ordering::Relaxed);
        info!("request processed, gate released");
    }
}

#[async_trait]
impl<P: Processor> Processor for SerializationGate<P> {
    async fn process(&self, envelope: &RequestEnvelope) -> Result<Bytes, CoordinatorError> {
        if self.locked.load(Ordering::Relaxed) {
            info!(call = %envelope.call, "gate busy, waiting for earlier requests");
        }

        // Declared before the release guard so it is dropped after it.
        let _held = self.lock.lock().await;
        self.locked.store(true, Ordering::Relaxed);
        let _release = Release {
            locked: &self.locked,
        };

        self.inner.process(envelope).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use super::*;
    use crate::coordinator::Coordinator;
    use crate::testing::{CountingUpstream, RecordingCache, envelope};

    /// Records how many invocations overlap.
    #[derive(Default)]
    struct Overlap {
        active: AtomicUsize,
        peak: AtomicUsize,
        total: AtomicUsize,
    }

    #[async_trait]
    impl Processor for Overlap {
        async fn process(&self, _envelope: &RequestEnvelope) -> Result<Bytes, CoordinatorError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.total.fetch_add(1, Ordering::SeqCst);
            Ok(Bytes::from_static(b"{}"))
        }
    }

    struct Panics;

    #[async_trait]
    impl Processor for Panics {
        async fn process(&self, _envelope: &RequestEnvelope) -> Result<Bytes, CoordinatorError> {
            panic!("processor blew up");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_calls_never_overlap() {
        let gate = Arc::new(SerializationGate::new(Overlap::default()));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let gate = Arc::clone(&gate);
                tokio::spawn(async move { gate.process(&envelope("ListarClientes", 1)).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(gate.inner().total.load(Ordering::SeqCst), 16);
        assert_eq!(gate.inner().peak.load(Ordering::SeqCst), 1);
        assert!(!gate.locked.load(Ordering::Relaxed));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_identical_misses_call_upstream_between_once_and_n_times() {
        const N: usize = 8;
        let cache = Arc::new(RecordingCache::default());
        let upstream = Arc::new(CountingUpstream::ok(b"{\"ok\":true}").with_delay(Duration::from_millis(10)));
        let gate = Arc::new(SerializationGate::new(Coordinator::new(cache.clone(), upstream.clone())));

        let tasks: Vec<_> = (0..N)
            .map(|_| {
                let gate = Arc::clone(&gate);
                tokio::spawn(async move { gate.process(&envelope("ListarClientes", 1)).await })
            })
            .collect();
        for task in tasks {
            assert_eq!(&task.await.unwrap().unwrap()[..], b"{\"ok\":true}");
        }

        // Serialization orders the calls but does not promise deduplication;
        // only the bounds are part of the contract.
        let calls = upstream.calls();
        assert!((1..=N).contains(&calls), "upstream called {calls} times");
    }

    #[tokio::test]
    async fn errors_release_the_gate() {
        let cache = Arc::new(RecordingCache::default());
        let upstream = Arc::new(CountingUpstream::failing(500));
        let gate = SerializationGate::new(Coordinator::new(cache, upstream.clone()));

        for _ in 0..3 {
            assert!(gate.process(&envelope("ListarClientes", 1)).await.is_err());
        }
        assert_eq!(upstream.calls(), 3);
        assert!(!gate.locked.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn panics_release_the_gate() {
        let gate = Arc::new(SerializationGate::new(Panics));

        let crashed = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.process(&envelope("ListarClientes", 1)).await })
        };
        assert!(crashed.await.unwrap_err().is_panic());

        assert!(!gate.locked.load(Ordering::Relaxed));
        assert!(gate.lock.try_lock().is_ok());
    }
}
