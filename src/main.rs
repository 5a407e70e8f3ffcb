use std::sync::Arc;

use omie_proxy::cache::{CacheStore, MemoryCache, RedisCache};
use omie_proxy::config::{CacheBackend, ProxyConfig};
use omie_proxy::coordinator::{Coordinator, SerializationGate};
use omie_proxy::upstream::OmieClient;
use omie_proxy::{Server, endpoint, serve};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is normal outside local development.
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound) {
            return Err(e.into());
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match ProxyConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    let cache: Arc<dyn CacheStore> = match config.cache_backend {
        CacheBackend::Redis => Arc::new(RedisCache::new(&config.redis)?),
        CacheBackend::Memory => {
            warn!("using in-process cache, entries are not shared between instances");
            Arc::new(MemoryCache::new())
        }
    };

    let client = OmieClient::new(config.omie_base_url.as_str(), config.omie_credentials.clone())?;
    let coordinator = Coordinator::new(cache, Arc::new(client));
    let pipeline = endpoint::pipeline(Arc::new(SerializationGate::new(coordinator)));

    let server = Server::bind(&config.listen_addr).await?;
    info!(
        address = %server.local_addr(),
        upstream = %config.omie_base_url,
        cache = ?config.cache_backend,
        "omie-proxy starting"
    );

    serve(server, pipeline).await?;
    Ok(())
}
