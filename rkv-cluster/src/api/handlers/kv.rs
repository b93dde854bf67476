//! Key-value handlers.
//!
//! Reads are served from the local replica and may lag the leader. Writes
//! go through consensus and are refused with 503 on a follower.

use crate::api::error::ApiError;
use crate::api::request;
use crate::api::response;
use crate::api::state::AppState;
use crate::command::KvCommand;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Body;
use hyper::{Request, Response};
use std::sync::Arc;

fn require_key(key: &str) -> Result<(), ApiError> {
    if key.is_empty() {
        return Err(ApiError::bad_request("E106", "key must not be empty"));
    }
    Ok(())
}

/// GET /kv/{key}
pub async fn get(state: Arc<AppState>, key: &str) -> Response<Full<Bytes>> {
    if let Err(e) = require_key(key) {
        return e.into_response();
    }

    match state.node.get(key).await {
        Some(value) => response::ok(&serde_json::json!({
            "key": key,
            "value": value
        })),
        None => ApiError::not_found("E107", format!("key not found: {}", key)).into_response(),
    }
}

/// PUT /kv/{key}
///
/// The request body is stored verbatim as the value.
pub async fn put<B>(req: Request<B>, state: Arc<AppState>, key: &str) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Into<request::BoxError>,
{
    if let Err(e) = require_key(key) {
        return e.into_response();
    }

    let value = match request::read_body_string(req).await {
        Ok(value) => value,
        Err(e) => return e.into_response(),
    };

    write(state, KvCommand::set(key, value)).await
}

/// DELETE /kv/{key}
pub async fn delete(state: Arc<AppState>, key: &str) -> Response<Full<Bytes>> {
    if let Err(e) = require_key(key) {
        return e.into_response();
    }

    write(state, KvCommand::delete(key)).await
}

async fn write(state: Arc<AppState>, cmd: KvCommand) -> Response<Full<Bytes>> {
    let key = cmd.key().to_string();

    match state.node.write(cmd).await {
        Ok(resp) => response::ok(&serde_json::json!({
            "key": key,
            "previous": resp.previous
        })),
        Err(e) => {
            tracing::debug!(%key, error = %e, "write refused");
            ApiError::from(e).into_response()
        }
    }
}
