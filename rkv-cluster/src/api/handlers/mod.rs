//! API request handlers.

pub mod health;
pub mod join;
pub mod kv;
pub mod snapshot;

#[cfg(test)]
pub(crate) mod testing {
    use crate::api::state::AppState;
    use crate::config::NodeConfig;
    use crate::raft::ClusterNode;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Start a bootstrapped single-node cluster and wrap it in handler state.
    pub async fn leader_state(id: &str) -> (TempDir, Arc<AppState>) {
        let dir = TempDir::new().unwrap();
        let config = NodeConfig::builder()
            .node_id(id)
            .raft_addr("127.0.0.1:0")
            .http_addr("127.0.0.1:0")
            .data_dir(dir.path())
            .election_timeout_ms(100, 200)
            .heartbeat_interval_ms(20)
            .build()
            .unwrap();

        let node = ClusterNode::start(config).await.unwrap();
        node.wait_for_leader(Duration::from_secs(5)).await.unwrap();
        (dir, Arc::new(AppState::new(Arc::new(node))))
    }
}
