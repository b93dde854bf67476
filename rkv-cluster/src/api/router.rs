//! Request routing for the API.
//!
//! Routes requests to appropriate handlers based on method and path.

use super::handlers;
use super::request::BoxError;
use super::response;
use super::state::AppState;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Body;
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use std::sync::Arc;

/// Route prefix for key-value endpoints.
const KV_PREFIX: &str = "/kv/";

/// Route an incoming request to the appropriate handler.
pub async fn route<B>(
    req: Request<B>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    tracing::debug!(method = %method, path = %path, "Routing request");

    let response = match (method, path.as_str()) {
        (Method::GET, "/health") => handlers::health::get_health(state).await,
        (Method::GET, "/status") => handlers::health::get_status(state).await,

        (Method::POST, "/join") => handlers::join::post_join(req, state).await,
        (_, "/join") => response::method_not_allowed(&["POST"]),

        (Method::POST, "/snapshot") => handlers::snapshot::trigger(state).await,
        (_, "/snapshot") => response::method_not_allowed(&["POST"]),

        (_, p) if p.starts_with(KV_PREFIX) => {
            let key = p.strip_prefix(KV_PREFIX).unwrap_or("").to_string();
            route_kv(req, state, &key).await
        }

        _ => response::not_found(),
    };

    Ok(response)
}

/// Route requests under /kv/{key}.
async fn route_kv<B>(req: Request<B>, state: Arc<AppState>, key: &str) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    match *req.method() {
        Method::GET => handlers::kv::get(state, key).await,
        Method::PUT => handlers::kv::put(req, state, key).await,
        Method::DELETE => handlers::kv::delete(state, key).await,
        _ => response::method_not_allowed(&["GET", "PUT", "DELETE"]),
    }
}
