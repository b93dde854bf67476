//! Common test utilities for rkv-cluster tests.

use rkv_cluster::{ClusterNode, NodeConfig, NodeConfigBuilder};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

/// How long tests wait for elections, joins and replication.
#[allow(dead_code)]
pub const WAIT: Duration = Duration::from_secs(10);

/// Reserve a loopback address that is free right now.
///
/// Used when a node must come back on the same address after a restart.
#[allow(dead_code)]
pub fn free_addr() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind probe socket");
    let addr = listener.local_addr().expect("probe address");
    addr.to_string()
}

/// Config with fast timings and ephemeral ports.
pub fn test_config(id: &str, data_dir: &Path) -> NodeConfigBuilder {
    NodeConfig::builder()
        .node_id(id)
        .raft_addr("127.0.0.1:0")
        .http_addr("127.0.0.1:0")
        .data_dir(data_dir)
        .election_timeout_ms(150, 300)
        .heartbeat_interval_ms(30)
        .join_timeout(WAIT)
        .shutdown_grace(Duration::from_secs(2))
}

/// A node that bootstraps a cluster of itself and has become leader.
#[allow(dead_code)]
pub async fn start_leader(id: &str, dir: &TempDir) -> ClusterNode {
    let config = test_config(id, dir.path()).build().expect("valid config");
    let node = ClusterNode::start(config).await.expect("start leader");
    node.wait_for_leader(WAIT).await.expect("leader elected");
    node
}

/// A node that waits to be admitted by an existing member.
#[allow(dead_code)]
pub async fn start_joiner(id: &str, dir: &TempDir, peer: &str) -> ClusterNode {
    let config = test_config(id, dir.path())
        .join_addr(peer)
        .build()
        .expect("valid config");
    ClusterNode::start(config).await.expect("start joiner")
}

/// Nodes started for one test, stopped together.
#[allow(dead_code)]
pub struct TestCluster {
    /// Temp directories for each node (kept alive for the test duration).
    _temp_dirs: Vec<TempDir>,
    /// Cluster nodes; the first one is the bootstrap leader.
    pub nodes: Vec<ClusterNode>,
}

#[allow(dead_code)]
impl TestCluster {
    /// Bootstrap `n1` and admit `n2..=n{node_count}` through it.
    pub async fn new(node_count: usize) -> Self {
        let mut temp_dirs = Vec::with_capacity(node_count);
        let mut nodes = Vec::with_capacity(node_count);

        let dir = TempDir::new().expect("Failed to create temp dir");
        nodes.push(start_leader("n1", &dir).await);
        temp_dirs.push(dir);

        for i in 2..=node_count {
            let id = format!("n{}", i);
            let dir = TempDir::new().expect("Failed to create temp dir");
            // The peer address only keeps the node from bootstrapping
            let node = start_joiner(&id, &dir, "127.0.0.1:1").await;

            let address = node.identity().bind_address.clone();
            nodes[0]
                .join(&address, &id)
                .await
                .expect("Failed to join node");

            nodes.push(node);
            temp_dirs.push(dir);
        }

        nodes[0]
            .wait_for_voters(node_count, WAIT)
            .await
            .expect("voters admitted");

        Self {
            _temp_dirs: temp_dirs,
            nodes,
        }
    }

    /// The bootstrap leader.
    pub fn leader(&self) -> &ClusterNode {
        &self.nodes[0]
    }

    /// Shutdown all nodes.
    pub async fn shutdown(&self) {
        for node in &self.nodes {
            let _ = node.shutdown().await;
        }
    }
}
