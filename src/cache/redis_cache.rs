use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{CacheError, CacheStore};

/// Upper bound for connecting plus one command.
const OPERATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Where and how to reach Redis.
#[derive(Clone)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: i64,
}

impl fmt::Debug for RedisSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("db", &self.db)
            .finish()
    }
}

impl RedisSettings {
    fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            addr: ConnectionAddr::Tcp(self.host.clone(), self.port),
            redis: RedisConnectionInfo {
                db: self.db,
                password: self.password.clone(),
                ..Default::default()
            },
        }
    }
}

/// Redis-backed [`CacheStore`] using `GET` and `SET .. EX`.
///
/// The connection is opened on first use and then shared; the
/// [`ConnectionManager`] reconnects by itself after failures. A Redis that is
/// down at startup therefore only shows up as failed reads and writes.
pub struct RedisCache {
    client: redis::Client,
    connection: Mutex<Option<ConnectionManager>>,
}

impl RedisCache {
    /// Creates the client without connecting.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Redis`] if the settings are rejected by the client.
    pub fn new(settings: &RedisSettings) -> Result<Self, CacheError> {
        let client = redis::Client::open(settings.connection_info())?;
        Ok(Self {
            client,
            connection: Mutex::new(None),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        let mut slot = self.connection.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }

        let conn = ConnectionManager::new(self.client.clone()).await?;
        info!("connected to redis");
        *slot = Some(conn.clone());
        Ok(conn)
    }
}

async fn bounded<T, F>(op: &'static str, fut: F) -> Result<T, CacheError>
where
    F: Future<Output = Result<T, CacheError>>,
{
    tokio::time::timeout(OPERATION_TIMEOUT, fut)
        .await
        .map_err(|_| CacheError::Unavailable(format!("{op} timed out after {OPERATION_TIMEOUT:?}")))?
}

/// `EX` takes whole seconds and rejects zero.
fn ttl_seconds(ttl: Duration) -> u64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    secs.max(1)
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        bounded("GET", async {
            let mut conn = self.connection().await?;
            let value: Option<Vec<u8>> = conn.get(key).await?;
            Ok(value.map(Bytes::from))
        })
        .await
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        let seconds = ttl_seconds(ttl);
        bounded("SET", async {
            let mut conn = self.connection().await?;
            conn.set_ex::<_, _, ()>(key, value.as_ref(), seconds).await?;
            debug!(ttl_secs = seconds, bytes = value.len(), "cache entry written");
            Ok(())
        })
        .await
    }
}
