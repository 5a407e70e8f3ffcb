//! Per-request context handed to middleware and route handlers.

use serde::de::DeserializeOwned;

use crate::Request;

/// Wraps the inbound [`Request`] for the duration of one dispatch.
pub struct Context {
    request: Request,
}

impl Context {
    pub fn new(request: Request) -> Self {
        Self { request }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Binds the request body as JSON.
    ///
    /// An empty body, invalid JSON, or JSON of the wrong shape for `T` are all
    /// reported the same way.
    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: DeserializeOwned,
    {
        serde_json::from_slice(self.request.body())
    }
}
