//! Client side of the control plane, used by a node joining at startup.

use super::handlers::join::JoinRequest;
use crate::error::{ClusterError, ClusterResult, MembershipError};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;

/// Ask the node at control-plane address `peer` to admit `join`.
///
/// Connection failures are [`ClusterError::Network`]; a non-2xx reply is a
/// [`MembershipError::Rejected`] carrying the peer's error message.
pub async fn request_join(peer: &str, join: &JoinRequest, timeout: Duration) -> ClusterResult<()> {
    let client: Client<_, Full<Bytes>> = Client::builder(TokioExecutor::new()).build_http();

    let body = serde_json::to_vec(join)?;
    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("http://{}/join", peer))
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .map_err(|e| ClusterError::Network(format!("invalid join target {}: {}", peer, e)))?;

    tracing::info!(%peer, node = %join.node_id, address = %join.address, "requesting to join cluster");

    let response = tokio::time::timeout(timeout, client.request(request))
        .await
        .map_err(|_| ClusterError::Network(format!("join request to {} timed out", peer)))?
        .map_err(|e| ClusterError::Network(format!("join request to {} failed: {}", peer, e)))?;

    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .map_err(|e| ClusterError::Network(format!("reading join response: {}", e)))?
        .to_bytes();

    if status.is_success() {
        return Ok(());
    }

    Err(MembershipError::Rejected(rejection_message(status.as_u16(), &bytes)).into())
}

/// Pull the message out of an error envelope, falling back to the raw body.
fn rejection_message(status: u16, body: &[u8]) -> String {
    let message = serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned());
    format!("peer answered {}: {}", status, message)
}
