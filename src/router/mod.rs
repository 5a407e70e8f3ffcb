//! Request routing: map an HTTP method and exact path to a handler.
//!
//! Trailing slashes are normalized on both registered paths and incoming
//! paths, so `/omie_request/` and `/omie_request` are the same route.
//! Routes are matched in registration order; anything unmatched is a
//! `404 Not Found`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::{Method, Response, StatusCode};

/// Type-erased async handler that turns a [`Context`] into a [`Response`].
pub type Handler =
    Arc<dyn Fn(Context) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static>;

/// Conversion trait for async handler functions.
///
/// Any `Fn(Context) -> impl Future<Output = Response> + Send` that is also
/// `Send + Sync + 'static` implements this trait through the blanket impl
/// below.
pub trait IntoHandler: Send + Sync + 'static {
    /// Call the handler with the given context, boxing the returned future.
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

impl<T, F> IntoHandler for T
where
    T: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin((self)(ctx))
    }
}

fn normalize(path: &str) -> &str {
    if path != "/" && path.ends_with('/') {
        &path[..path.len() - 1]
    } else {
        path
    }
}

struct Route {
    method: Method,
    path: String,
    handler: Handler,
}

/// Dispatches requests to the first route whose method and path match.
///
/// # Examples
///
/// ```rust,no_run
/// use omie_proxy::{Router, Response, StatusCode};
///
/// let mut router = Router::new();
/// router.post("/omie_request", |_ctx| async { Response::new(StatusCode::Ok) });
/// assert_eq!(router.len(), 1);
/// ```
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `POST` requests to `path`.
    pub fn post(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(Method::Post, path, handler);
    }

    /// Register a handler for `method` requests to `path`.
    pub fn add_route(&mut self, method: Method, path: &str, handler: impl IntoHandler) {
        let handler: Handler = Arc::new(move |ctx| handler.call(ctx));
        self.routes.push(Route {
            method,
            path: normalize(path).to_owned(),
            handler,
        });
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Hands `ctx` to the matching route, or answers `404 Not Found`.
    pub async fn dispatch(&self, ctx: Context) -> Response {
        let request = ctx.request();
        let path = normalize(request.path());

        let route = self
            .routes
            .iter()
            .find(|route| &route.method == request.method() && route.path == path);

        match route {
            Some(route) => (route.handler)(ctx).await,
            None => Response::new(StatusCode::NotFound).body("Not Found"),
        }
    }
}
