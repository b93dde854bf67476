//! Manual snapshot handler.

use crate::api::error::ApiError;
use crate::api::response;
use crate::api::state::AppState;
use bytes::Bytes;
use http_body_util::Full;
use hyper::Response;
use std::sync::Arc;

/// POST /snapshot
///
/// Asks Raft to build a snapshot. The snapshot is built in the background,
/// so this returns 202 once the request is queued.
pub async fn trigger(state: Arc<AppState>) -> Response<Full<Bytes>> {
    match state.node.trigger_snapshot().await {
        Ok(()) => response::accepted(&serde_json::json!({
            "status": "snapshot_requested",
            "last_applied": state.node.metrics().last_applied.map(|id| id.index)
        })),
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::testing::leader_state;
    use crate::command::KvCommand;
    use hyper::StatusCode;
    use std::time::Duration;

    #[tokio::test]
    async fn snapshot_is_accepted_and_persisted() {
        let (_dir, state) = leader_state("n1").await;
        state.node.write(KvCommand::set("a", "1")).await.unwrap();

        let response = trigger(Arc::clone(&state)).await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let node = Arc::clone(&state.node);
        tokio::time::timeout(Duration::from_secs(5), async move {
            loop {
                if node.metrics().snapshot.is_some() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("snapshot should be built");

        state.node.shutdown().await.unwrap();
    }
}
