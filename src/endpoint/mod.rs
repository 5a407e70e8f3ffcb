//! `POST /omie_request`: bind the envelope, run it through the gated
//! coordinator, and write the upstream bytes back unchanged.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::context::Context;
use crate::coordinator::{Processor, RequestEnvelope};
use crate::middleware::{LoggerMiddleware, Pipeline, from_middleware};
use crate::router::Router;
use crate::{Response, StatusCode};

/// Route served by the proxy.
pub const OMIE_REQUEST_PATH: &str = "/omie_request";

/// Builds the proxy's router around `processor`.
pub fn router(processor: Arc<dyn Processor>) -> Router {
    let mut router = Router::new();
    router.post(OMIE_REQUEST_PATH, move |ctx: Context| {
        omie_request(ctx, Arc::clone(&processor))
    });
    router
}

/// The full request pipeline: access logging in front of [`router`].
pub fn pipeline(processor: Arc<dyn Processor>) -> Pipeline {
    Pipeline::new(router(processor)).with(from_middleware(Arc::new(LoggerMiddleware)))
}

/// Handles one `POST /omie_request`.
///
/// Processing runs on its own task: a client that hangs up cannot cancel a
/// call that already holds the gate, and a panic inside it becomes a 500
/// instead of tearing down the connection.
pub async fn omie_request(ctx: Context, processor: Arc<dyn Processor>) -> Response {
    let envelope: RequestEnvelope = match ctx.json() {
        Ok(envelope) => envelope,
        Err(e) => {
            debug!(error = %e, "rejecting request body");
            return Response::error(StatusCode::BadRequest, "Invalid JSON");
        }
    };

    let outcome = tokio::spawn(async move { processor.process(&envelope).await }).await;

    match outcome {
        Ok(Ok(data)) => Response::json(StatusCode::Ok, data),
        Ok(Err(e)) => {
            warn!(error = %e, "omie request failed");
            Response::error(StatusCode::InternalServerError, e.to_string())
        }
        Err(e) => {
            error!(error = %e, "omie request task aborted");
            Response::error(StatusCode::InternalServerError, "request processing aborted")
        }
    }
}
