//! Cache store client: TTL-bounded key/value storage for upstream responses.
//!
//! - [`CacheStore`]: the get/set seam the coordinator talks to.
//! - [`RedisCache`]: production backend.
//! - [`MemoryCache`]: in-process backend for tests and Redis-less local runs.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

mod memory;
mod redis_cache;

pub use memory::MemoryCache;
pub use redis_cache::{RedisCache, RedisSettings};

/// Errors surfaced by a [`CacheStore`].
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("cache store unavailable: {0}")]
    Unavailable(String),
}

/// Key/value storage with per-entry expiry.
///
/// Values are opaque bytes; a store never parses what it holds.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the live value under `key`.
    ///
    /// `Ok(None)` is a miss (absent or expired). `Err` means the store could
    /// not answer at all; callers decide whether that is fatal.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError>;

    /// Stores `value` under `key` for `ttl`, replacing any existing value.
    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError>;
}
