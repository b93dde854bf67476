//! Node configuration.

use crate::error::{ClusterError, ClusterResult};
use crate::types::NodeIdentity;
use openraft::{Config, SnapshotPolicy};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Extra time a joining node allows for the peer's response to arrive.
const JOIN_RESPONSE_MARGIN: Duration = Duration::from_secs(5);

/// Configuration for a cluster node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// This node's unique string ID in the cluster.
    pub node_id: String,

    /// Address this node binds for consensus traffic (e.g., "0.0.0.0:7000").
    pub raft_addr: String,

    /// Consensus address advertised to other nodes (e.g., "192.168.1.10:7000").
    /// If not set, uses raft_addr.
    pub advertise_addr: Option<String>,

    /// Address the HTTP control plane binds (e.g., "0.0.0.0:8080").
    pub http_addr: String,

    /// Control-plane address of an existing member to join through.
    /// When absent the node bootstraps a new single-member cluster.
    pub join_addr: Option<String>,

    /// Directory holding this node's log and snapshot stores.
    pub data_dir: PathBuf,

    /// Raft timing configuration.
    pub raft: RaftConfig,

    /// Snapshot configuration.
    pub snapshot: SnapshotConfig,

    /// How long a join waits for the membership change to commit.
    pub join_timeout_ms: u64,

    /// How long the control plane may drain in-flight requests on shutdown.
    pub shutdown_grace_ms: u64,
}

/// Raft timing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaftConfig {
    /// Election timeout range (min, max) in milliseconds.
    /// A random value in this range is chosen for each election.
    pub election_timeout_ms: (u64, u64),

    /// Heartbeat interval in milliseconds.
    pub heartbeat_interval_ms: u64,

    /// Maximum entries per AppendEntries RPC.
    pub max_entries_per_append: u64,

    /// Timeout for a single consensus RPC in milliseconds.
    pub rpc_timeout_ms: u64,
}

/// Snapshot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Create snapshot after this many log entries.
    pub snapshot_threshold: u64,

    /// Maximum number of log entries to keep after snapshot.
    pub max_log_entries: u64,

    /// Number of snapshots kept on disk.
    pub retain: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: String::new(),
            raft_addr: "127.0.0.1:7000".to_string(),
            advertise_addr: None,
            http_addr: "127.0.0.1:8080".to_string(),
            join_addr: None,
            data_dir: PathBuf::from("."),
            raft: RaftConfig::default(),
            snapshot: SnapshotConfig::default(),
            join_timeout_ms: 30_000,
            shutdown_grace_ms: 30_000,
        }
    }
}

impl Default for RaftConfig {
    fn default() -> Self {
        Self {
            // Election timeout: 150-300ms (standard Raft recommendation)
            election_timeout_ms: (150, 300),
            // Heartbeat: 50ms (should be << election timeout)
            heartbeat_interval_ms: 50,
            max_entries_per_append: 100,
            rpc_timeout_ms: 10_000,
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            snapshot_threshold: 10_000,
            max_log_entries: 1_000,
            retain: 10,
        }
    }
}

impl NodeConfig {
    /// Create a new configuration builder.
    pub fn builder() -> NodeConfigBuilder {
        NodeConfigBuilder::default()
    }

    /// Get the advertised consensus address (falls back to raft_addr).
    pub fn advertise_addr(&self) -> &str {
        self.advertise_addr.as_deref().unwrap_or(&self.raft_addr)
    }

    /// This node's identity as seen by the rest of the cluster.
    pub fn identity(&self) -> NodeIdentity {
        NodeIdentity {
            id: self.node_id.clone(),
            bind_address: self.advertise_addr().to_string(),
        }
    }

    /// Directory of the durable log store, namespaced by node id.
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join(format!("{}-db.log", self.node_id))
    }

    /// Directory of the durable snapshot store, namespaced by node id.
    pub fn snapshot_dir(&self) -> PathBuf {
        self.data_dir.join(format!("{}-snapshots", self.node_id))
    }

    /// Get the heartbeat interval as a Duration.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.raft.heartbeat_interval_ms)
    }

    /// Get the consensus RPC timeout as a Duration.
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.raft.rpc_timeout_ms)
    }

    /// Get the join timeout as a Duration.
    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    /// How long a joining node waits for the peer's answer to `POST /join`.
    ///
    /// The peer may spend the full join timeout committing the membership
    /// change before it responds, so the caller waits a little longer.
    pub fn join_request_timeout(&self) -> Duration {
        self.join_timeout() + JOIN_RESPONSE_MARGIN
    }

    /// Get the shutdown grace period as a Duration.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Validate the configuration.
    ///
    /// Has no side effects: nothing is created on disk and no socket is bound.
    pub fn validate(&self) -> ClusterResult<()> {
        if self.node_id.trim().is_empty() {
            return Err(ClusterError::Config("must specify a node ID".to_string()));
        }

        // The id names directories under data_dir.
        if self.node_id.contains(|c| matches!(c, '/' | '\\' | '\0'))
            || self.node_id.contains("..")
        {
            return Err(ClusterError::Config(format!(
                "node ID {:?} must not contain path separators or \"..\"",
                self.node_id
            )));
        }

        if self.raft_addr.trim().is_empty() {
            return Err(ClusterError::Config(
                "must specify a raft bind address".to_string(),
            ));
        }

        let (min_election, max_election) = self.raft.election_timeout_ms;
        if min_election >= max_election {
            return Err(ClusterError::Config(format!(
                "election_timeout_ms min must be below max ({} >= {})",
                min_election, max_election
            )));
        }

        // Heartbeat should be much less than election timeout
        if self.raft.heartbeat_interval_ms >= min_election / 2 {
            return Err(ClusterError::Config(format!(
                "heartbeat_interval_ms ({}) should be << election_timeout_ms ({})",
                self.raft.heartbeat_interval_ms, min_election
            )));
        }

        if self.raft.max_entries_per_append == 0 {
            return Err(ClusterError::Config(
                "max_entries_per_append must be at least 1".to_string(),
            ));
        }

        if self.snapshot.retain == 0 {
            return Err(ClusterError::Config(
                "snapshot retain must be at least 1".to_string(),
            ));
        }

        self.raft_config().map(|_| ())
    }

    /// The openraft configuration derived from these settings, validated.
    pub fn raft_config(&self) -> ClusterResult<Config> {
        let config = Config {
            cluster_name: "rkv".to_string(),
            election_timeout_min: self.raft.election_timeout_ms.0,
            election_timeout_max: self.raft.election_timeout_ms.1,
            heartbeat_interval: self.raft.heartbeat_interval_ms,
            max_payload_entries: self.raft.max_entries_per_append,
            snapshot_policy: SnapshotPolicy::LogsSinceLast(self.snapshot.snapshot_threshold),
            max_in_snapshot_log_to_keep: self.snapshot.max_log_entries,
            ..Default::default()
        };

        config
            .validate()
            .map_err(|e| ClusterError::Config(e.to_string()))
    }
}

/// Builder for NodeConfig.
#[derive(Debug, Default)]
pub struct NodeConfigBuilder {
    config: NodeConfig,
}

impl NodeConfigBuilder {
    /// Set the node ID.
    pub fn node_id(mut self, id: impl Into<String>) -> Self {
        self.config.node_id = id.into();
        self
    }

    /// Set the consensus bind address.
    pub fn raft_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.raft_addr = addr.into();
        self
    }

    /// Set the advertised consensus address.
    pub fn advertise_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.advertise_addr = Some(addr.into());
        self
    }

    /// Set the control-plane bind address.
    pub fn http_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.http_addr = addr.into();
        self
    }

    /// Join an existing cluster through this control-plane address.
    /// An empty address means "bootstrap a new cluster".
    pub fn join_addr(mut self, addr: impl Into<String>) -> Self {
        let addr = addr.into();
        self.config.join_addr = if addr.trim().is_empty() {
            None
        } else {
            Some(addr)
        };
        self
    }

    /// Set the data directory.
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set election timeout range in milliseconds.
    pub fn election_timeout_ms(mut self, min: u64, max: u64) -> Self {
        self.config.raft.election_timeout_ms = (min, max);
        self
    }

    /// Set heartbeat interval in milliseconds.
    pub fn heartbeat_interval_ms(mut self, ms: u64) -> Self {
        self.config.raft.heartbeat_interval_ms = ms;
        self
    }

    /// Set the maximum entries per AppendEntries RPC.
    pub fn max_entries_per_append(mut self, entries: u64) -> Self {
        self.config.raft.max_entries_per_append = entries;
        self
    }

    /// Set snapshot threshold.
    pub fn snapshot_threshold(mut self, entries: u64) -> Self {
        self.config.snapshot.snapshot_threshold = entries;
        self
    }

    /// Set the number of snapshots kept on disk.
    pub fn snapshot_retain(mut self, retain: usize) -> Self {
        self.config.snapshot.retain = retain;
        self
    }

    /// Set the join timeout.
    pub fn join_timeout(mut self, timeout: Duration) -> Self {
        self.config.join_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the shutdown grace period.
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.config.shutdown_grace_ms = grace.as_millis() as u64;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ClusterResult<NodeConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
