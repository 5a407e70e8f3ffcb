//! Cache-aside request coordination.
//!
//! [`Coordinator`] turns a [`RequestEnvelope`] into upstream bytes:
//!
//! 1. derive the [`CacheKey`],
//! 2. read the cache and return on a hit,
//! 3. otherwise call the upstream,
//! 4. write the result back with [`CACHE_TTL`],
//! 5. return the bytes untouched.
//!
//! [`SerializationGate`] wraps any [`Processor`] in one process-wide lock.
//! Both implement [`Processor`], which is all the HTTP layer sees, so a
//! per-key lock or single-flight strategy could later replace the gate
//! without changing the endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::{CacheError, CacheStore};
use crate::upstream::{Upstream, UpstreamError};

mod envelope;
mod gate;

pub use envelope::{CacheKey, RequestEnvelope};
pub use gate::SerializationGate;

/// Lifetime of every cache entry, counted from the write.
pub const CACHE_TTL: Duration = Duration::from_secs(60);

/// Why an envelope could not be turned into a response body.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("failed to derive cache key: {0}")]
    KeyDerivation(#[source] serde_json::Error),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("failed to write cache entry: {0}")]
    CacheWrite(#[source] CacheError),
}

/// Anything that can answer an envelope with raw response bytes.
#[async_trait]
pub trait Processor: Send + Sync {
    async fn process(&self, envelope: &RequestEnvelope) -> Result<Bytes, CoordinatorError>;
}

/// Cache-aside coordinator over a [`CacheStore`] and an [`Upstream`].
pub struct Coordinator {
    cache: Arc<dyn CacheStore>,
    upstream: Arc<dyn Upstream>,
}

impl Coordinator {
    pub fn new(cache: Arc<dyn CacheStore>, upstream: Arc<dyn Upstream>) -> Self {
        Self { cache, upstream }
    }
}

#[async_trait]
impl Processor for Coordinator {
    async fn process(&self, envelope: &RequestEnvelope) -> Result<Bytes, CoordinatorError> {
        let key = envelope
            .cache_key()
            .map_err(CoordinatorError::KeyDerivation)?;

        match self.cache.get(key.as_str()).await {
            Ok(Some(cached)) => {
                info!(call = %envelope.call, bytes = cached.len(), "served from cache");
                return Ok(cached);
            }
            Ok(None) => debug!(call = %envelope.call, "cache miss"),
            // An unreachable store reads as a miss.
            Err(e) => warn!(call = %envelope.call, error = %e, "cache read failed, falling through to upstream"),
        }

        let data = self.upstream.invoke(envelope).await?;

        self.cache
            .set(key.as_str(), data.clone(), CACHE_TTL)
            .await
            .map_err(CoordinatorError::CacheWrite)?;

        info!(call = %envelope.call, bytes = data.len(), "fetched from upstream");
        Ok(data)
    }
}
