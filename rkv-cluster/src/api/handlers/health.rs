//! Health and status endpoint handlers.

use crate::api::response;
use crate::api::state::AppState;
use bytes::Bytes;
use http_body_util::Full;
use hyper::Response;
use std::sync::Arc;

/// GET /health
///
/// Simple health check that returns 200 OK if the server is running.
pub async fn get_health(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "status": "healthy",
        "service": "rkv",
        "node": state.node.identity().id
    });

    response::ok(&body)
}

/// GET /status
///
/// Returns the node's Raft role, term, log positions and the membership.
pub async fn get_status(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let node = &state.node;
    let metrics = node.metrics();

    let members: Vec<_> = node
        .members()
        .into_iter()
        .map(|m| {
            serde_json::json!({
                "id": m.id,
                "address": m.address,
                "voter": m.is_voter
            })
        })
        .collect();

    let body = serde_json::json!({
        "node": node.identity().id,
        "raft_id": node.node_id(),
        "address": node.identity().bind_address,
        "role": format!("{:?}", metrics.state).to_lowercase(),
        "lifecycle": node.state().as_str(),
        "leader": node.leader().map(|l| l.describe()),
        "current_term": metrics.current_term,
        "last_log_index": metrics.last_log_index,
        "last_applied": metrics.last_applied.map(|id| id.index),
        "members": members,
        "uptime_seconds": state.uptime_secs()
    });

    response::ok(&body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::testing::leader_state;
    use http_body_util::BodyExt;
    use hyper::StatusCode;

    #[tokio::test]
    async fn health_check_returns_ok() {
        let (_dir, state) = leader_state("n1").await;
        let response = get_health(Arc::clone(&state)).await;

        assert_eq!(response.status(), StatusCode::OK);
        state.node.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn status_reports_leader_and_members() {
        let (_dir, state) = leader_state("n1").await;
        let response = get_status(Arc::clone(&state)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["role"], "leader");
        assert_eq!(body["lifecycle"], "running");
        assert_eq!(body["members"].as_array().unwrap().len(), 1);
        assert_eq!(body["members"][0]["id"], "n1");
        assert_eq!(body["members"][0]["voter"], true);

        state.node.shutdown().await.unwrap();
    }
}
