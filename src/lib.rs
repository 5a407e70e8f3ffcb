//! # omie-proxy
//!
//! A caching HTTP proxy in front of the Omie ERP API.
//!
//! Clients `POST /omie_request` with `{ "call", "param", "url" }`. The proxy
//! answers from a 60-second cache when it can, otherwise adds the Omie
//! credentials, forwards the call, stores the result and returns the upstream
//! bytes unchanged. All processing runs one request at a time.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use omie_proxy::cache::MemoryCache;
//! use omie_proxy::coordinator::{Coordinator, SerializationGate};
//! use omie_proxy::upstream::{OmieClient, OmieCredentials, Secret, DEFAULT_BASE_URL};
//! use omie_proxy::{Server, endpoint, serve};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let credentials = OmieCredentials {
//!         app_key: Secret::new("key"),
//!         app_secret: Secret::new("secret"),
//!     };
//!     let client = OmieClient::new(DEFAULT_BASE_URL, credentials)?;
//!     let coordinator = Coordinator::new(Arc::new(MemoryCache::new()), Arc::new(client));
//!     let pipeline = endpoint::pipeline(Arc::new(SerializationGate::new(coordinator)));
//!
//!     let server = Server::bind("127.0.0.1:8080").await?;
//!     serve(server, pipeline).await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

pub mod cache;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod endpoint;
pub mod http;
pub mod middleware;
pub mod router;
pub mod server;
pub mod upstream;

#[cfg(test)]
mod testing;

pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::Router;
pub use server::{Server, ServerError};

use middleware::Pipeline;

/// Runs `pipeline` on every request accepted by `server`.
///
/// # Errors
///
/// Returns [`ServerError`] if the listener fails.
pub async fn serve(server: Server, pipeline: Pipeline) -> Result<(), ServerError> {
    let pipeline = Arc::new(pipeline);
    server
        .run(move |request: Request| {
            let pipeline = Arc::clone(&pipeline);
            async move { pipeline.handle(request).await }
        })
        .await
}
