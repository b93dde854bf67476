//! Single-node cluster tests.

mod common;

use common::{WAIT, free_addr, start_leader, test_config};
use rkv_cluster::{ClusterError, ClusterNode, KvCommand, NodeConfig, NodeState};
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test]
async fn bootstrap_has_exactly_one_voter() {
    let dir = TempDir::new().unwrap();
    let node = start_leader("n1", &dir).await;

    assert!(node.is_leader());
    assert_eq!(node.state(), NodeState::Running);

    let members = node.members();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].id, "n1");
    assert_eq!(members[0].address, node.identity().bind_address);
    assert!(members[0].is_voter);

    node.shutdown().await.unwrap();
}

#[tokio::test]
async fn ephemeral_port_is_advertised() {
    let dir = TempDir::new().unwrap();
    let node = start_leader("n1", &dir).await;

    assert_ne!(node.raft_addr().port(), 0);
    assert_eq!(node.identity().bind_address, node.raft_addr().to_string());

    node.shutdown().await.unwrap();
}

#[tokio::test]
async fn set_then_delete() {
    let dir = TempDir::new().unwrap();
    let node = start_leader("n1", &dir).await;

    let resp = node.write(KvCommand::set("k", "v")).await.unwrap();
    assert_eq!(resp.previous, None);
    assert_eq!(node.get("k").await.as_deref(), Some("v"));

    let resp = node.write(KvCommand::set("k", "w")).await.unwrap();
    assert_eq!(resp.previous.as_deref(), Some("v"));

    let resp = node.write(KvCommand::delete("k")).await.unwrap();
    assert_eq!(resp.previous.as_deref(), Some("w"));
    assert!(node.state_machine().is_empty().await);

    node.shutdown().await.unwrap();
}

#[tokio::test]
async fn invalid_config_touches_nothing() {
    let dir = TempDir::new().unwrap();

    let mut config = test_config("n1", dir.path()).build().unwrap();
    config.node_id = String::new();
    let err = ClusterNode::start(config).await.err().unwrap();
    assert!(matches!(err, ClusterError::Config(_)));
    assert!(err.is_fatal());

    let mut config = test_config("n1", dir.path()).build().unwrap();
    config.raft_addr = String::new();
    let err = ClusterNode::start(config).await.err().unwrap();
    assert!(matches!(err, ClusterError::Config(_)));

    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn busy_raft_address_is_resource_error() {
    let dir = TempDir::new().unwrap();
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = taken.local_addr().unwrap().to_string();

    let config = test_config("n1", dir.path()).raft_addr(addr).build().unwrap();
    let err = ClusterNode::start(config).await.err().unwrap();
    assert!(matches!(err, ClusterError::Resource { .. }));
}

#[tokio::test]
async fn shutdown_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let node = start_leader("n1", &dir).await;

    node.shutdown().await.unwrap();
    assert_eq!(node.state(), NodeState::Stopped);

    node.shutdown().await.unwrap();
    assert_eq!(node.state(), NodeState::Stopped);
}

#[tokio::test]
async fn manual_snapshot_is_written_to_disk() {
    let dir = TempDir::new().unwrap();
    let config = test_config("n1", dir.path()).build().unwrap();
    let snapshot_dir = config.snapshot_dir();
    let node = ClusterNode::start(config).await.unwrap();
    node.wait_for_leader(WAIT).await.unwrap();

    for i in 0..10 {
        node.write(KvCommand::set(format!("k{}", i), i.to_string()))
            .await
            .unwrap();
    }
    node.trigger_snapshot().await.unwrap();

    tokio::time::timeout(WAIT, async {
        while node.metrics().snapshot.is_none() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("snapshot built");

    let snapshots = std::fs::read_dir(&snapshot_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("snap-"))
        .count();
    assert!(snapshots >= 1);

    node.shutdown().await.unwrap();
}

#[tokio::test]
async fn restart_recovers_log_and_snapshot() {
    let dir = TempDir::new().unwrap();
    let raft_addr = free_addr();
    let config: NodeConfig = test_config("n1", dir.path())
        .raft_addr(raft_addr.clone())
        .build()
        .unwrap();

    let last_index = {
        let node = ClusterNode::start(config.clone()).await.unwrap();
        node.wait_for_leader(WAIT).await.unwrap();

        node.write(KvCommand::set("a", "1")).await.unwrap();
        node.write(KvCommand::set("b", "2")).await.unwrap();
        node.trigger_snapshot().await.unwrap();
        tokio::time::timeout(WAIT, async {
            while node.metrics().snapshot.is_none() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("snapshot built");

        // Entries after the snapshot are only in the log
        node.write(KvCommand::set("c", "3")).await.unwrap();
        node.write(KvCommand::delete("a")).await.unwrap();

        let last = node.metrics().last_applied.map(|id| id.index).unwrap();
        node.shutdown().await.unwrap();
        last
    };

    let node = ClusterNode::start(config).await.unwrap();
    node.wait_for_leader(WAIT).await.unwrap();
    node.wait_for_applied(last_index, WAIT).await.unwrap();

    assert_eq!(node.get("a").await, None);
    assert_eq!(node.get("b").await.as_deref(), Some("2"));
    assert_eq!(node.get("c").await.as_deref(), Some("3"));

    // Still a single voter; bootstrap was skipped
    let members = node.members();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].address, raft_addr);

    node.shutdown().await.unwrap();
}

#[tokio::test]
async fn edited_log_entry_fails_restart_as_corruption() {
    let dir = TempDir::new().unwrap();
    let config: NodeConfig = test_config("n1", dir.path())
        .raft_addr(free_addr())
        .build()
        .unwrap();

    {
        let node = ClusterNode::start(config.clone()).await.unwrap();
        node.wait_for_leader(WAIT).await.unwrap();
        node.write(KvCommand::set("a", "1")).await.unwrap();
        node.write(KvCommand::set("b", "2")).await.unwrap();
        node.shutdown().await.unwrap();
    }

    let segment = config.log_dir().join("segments").join("seg_000000000000.log");
    let text = std::fs::read_to_string(&segment).unwrap();
    assert!(text.contains(r#""op":"set""#));
    std::fs::write(&segment, text.replacen(r#""op":"set""#, r#""op":"incr""#, 1)).unwrap();

    let err = ClusterNode::start(config).await.err().unwrap();
    assert!(matches!(err, ClusterError::StateCorruption(_)), "{err}");
    assert!(err.is_fatal());
}
