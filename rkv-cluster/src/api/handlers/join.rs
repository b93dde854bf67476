//! Membership handler.

use crate::api::error::ApiError;
use crate::api::request;
use crate::api::response;
use crate::api::state::AppState;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Body;
use hyper::{Request, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Body of `POST /join`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    /// Consensus address of the joining node.
    pub address: String,
    /// String id of the joining node.
    pub node_id: String,
}

impl JoinRequest {
    /// Create a join request.
    pub fn new(address: impl Into<String>, node_id: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            node_id: node_id.into(),
        }
    }
}

/// POST /join
///
/// Admit a node as a voting member. A body that does not decode is a 400;
/// any membership failure is a 500 carrying the error text.
pub async fn post_join<B>(req: Request<B>, state: Arc<AppState>) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Into<request::BoxError>,
{
    let join: JoinRequest = match request::read_body_json(req).await {
        Ok(join) => join,
        Err(e) => {
            tracing::warn!(error = %e, "rejecting malformed join request");
            return e.into_response();
        }
    };

    match state.node.join(&join.address, &join.node_id).await {
        Ok(()) => response::ok(&serde_json::json!({
            "status": "joined",
            "node_id": join.node_id,
            "address": join.address
        })),
        Err(e) => {
            tracing::warn!(node = %join.node_id, address = %join.address, error = %e, "join failed");
            ApiError::from(e).into_response()
        }
    }
}
