//! ClusterNode - the main entry point for cluster operations.

use crate::command::KvCommand;
use crate::config::NodeConfig;
use crate::error::{ClusterError, ClusterResult, MembershipError};
use crate::network::{RaftNetworkClient, RaftRpcServer};
use crate::raft::lifecycle::{Lifecycle, NodeState};
use crate::raft::storage::LogStore;
use crate::state::{KvResponse, KvStateMachine, SnapshotStore};
use crate::types::{
    ClusterMember, ClusterMetrics, ClusterNodeId, ClusterRaft, ClusterRaftWriteError, LeaderInfo,
    MemberNode, NodeIdentity, extract_forward_to_leader, is_forward_to_leader, raft_node_id,
};
use openraft::error::{InitializeError, RaftError};
use openraft::{ChangeMembers, Raft};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A node in the key-value cluster.
///
/// This is the main entry point for interacting with the cluster.
/// It manages the Raft instance, the consensus transport, and provides
/// methods for writing commands through consensus and admitting members.
pub struct ClusterNode {
    /// This node's string id and advertised consensus address.
    identity: NodeIdentity,
    /// This node's Raft ID.
    node_id: ClusterNodeId,
    /// The Raft instance.
    raft: ClusterRaft,
    /// The state machine (for read-only queries).
    state_machine: Arc<KvStateMachine>,
    /// The durable log store.
    log_store: LogStore,
    /// Address the consensus transport is bound to.
    raft_addr: SocketAddr,
    /// How long a join may take.
    join_timeout: Duration,
    /// Lifecycle state.
    lifecycle: Lifecycle,
    /// Stops the consensus transport.
    transport_shutdown: CancellationToken,
    /// Consensus transport task.
    transport_task: Mutex<Option<JoinHandle<()>>>,
}

impl ClusterNode {
    /// Start a cluster node.
    ///
    /// Validates the configuration, binds the consensus transport, opens the
    /// durable stores and starts Raft. Without a join address the node
    /// bootstraps a single-member cluster of itself; a node restarting over
    /// existing state keeps the membership it already has.
    pub async fn start(config: NodeConfig) -> ClusterResult<Self> {
        let lifecycle = Lifecycle::new();

        config.validate()?;
        lifecycle.transition(NodeState::Validated)?;

        // Acquire resources; anything opened so far is dropped on failure
        let listener = TcpListener::bind(&config.raft_addr).await.map_err(|e| {
            ClusterError::resource(format!("consensus listener on {}", config.raft_addr), e)
        })?;
        let raft_addr = listener.local_addr()?;

        let mut identity = config.identity();
        if config.advertise_addr.is_none() && config.raft_addr.ends_with(":0") {
            // An ephemeral bind advertises the port it actually got
            identity.bind_address = raft_addr.to_string();
        }
        let node_id = identity.raft_id();

        let log_store = LogStore::open(config.log_dir()).map_err(|e| {
            ClusterError::open_store(format!("log store at {}", config.log_dir().display()), e)
        })?;

        let snapshot_store = SnapshotStore::open(config.snapshot_dir(), config.snapshot.retain)
            .map_err(|e| {
                ClusterError::resource(
                    format!("snapshot store at {}", config.snapshot_dir().display()),
                    e,
                )
            })?;
        let state_machine = Arc::new(KvStateMachine::open(snapshot_store)?);

        lifecycle.transition(NodeState::Resourced)?;

        let raft_config = Arc::new(config.raft_config()?);

        let network = RaftNetworkClient::new(config.rpc_timeout());

        let raft = Raft::new(
            node_id,
            raft_config,
            network,
            log_store.clone(),
            Arc::clone(&state_machine),
        )
        .await
        .map_err(|e| ClusterError::Storage(format!("Failed to create Raft: {}", e)))?;

        let transport_shutdown = CancellationToken::new();
        let transport_task = tokio::spawn(
            RaftRpcServer::new(raft.clone()).serve(listener, transport_shutdown.clone()),
        );

        let node = Self {
            identity,
            node_id,
            raft,
            state_machine,
            log_store,
            raft_addr,
            join_timeout: config.join_timeout(),
            lifecycle,
            transport_shutdown,
            transport_task: Mutex::new(Some(transport_task)),
        };

        if config.join_addr.is_none() {
            node.bootstrap().await?;
        }

        node.lifecycle.transition(NodeState::Running)?;

        tracing::info!(
            node = %node.identity.id,
            raft_id = node.node_id,
            raft_addr = %node.raft_addr,
            advertise = %node.identity.bind_address,
            "cluster node started"
        );

        Ok(node)
    }

    /// Make this node the sole voter of a new cluster.
    ///
    /// A node that already has state is left alone.
    async fn bootstrap(&self) -> ClusterResult<()> {
        let mut members = BTreeMap::new();
        members.insert(self.node_id, self.identity.member_node());

        match self.raft.initialize(members).await {
            Ok(()) => {
                tracing::info!(node = %self.identity.id, "bootstrapped single-node cluster");
                Ok(())
            }
            Err(RaftError::APIError(InitializeError::NotAllowed(_))) => {
                tracing::info!(
                    node = %self.identity.id,
                    "existing cluster state found, skipping bootstrap"
                );
                Ok(())
            }
            Err(e) => Err(ClusterError::Storage(format!(
                "failed to bootstrap cluster: {}",
                e
            ))),
        }
    }

    /// Admit `node_id` at consensus `address` as a voting member.
    ///
    /// Must be called on the leader. The node is first added as a learner
    /// (waiting for it to catch up) and then promoted with an incremental
    /// voter change, so concurrent joins never overwrite each other.
    pub async fn join(&self, address: &str, node_id: &str) -> Result<(), MembershipError> {
        let address = address.trim();
        let node_id = node_id.trim();
        if node_id.is_empty() {
            return Err(MembershipError::InvalidRequest("node_id is required".to_string()));
        }
        if address.is_empty() {
            return Err(MembershipError::InvalidRequest("address is required".to_string()));
        }

        let metrics = self.metrics();
        if metrics.current_leader != Some(self.node_id) {
            return Err(MembershipError::NotLeader {
                leader: self.leader().map(|info| info.describe()),
            });
        }

        let target = raft_node_id(node_id);
        let voters: BTreeSet<ClusterNodeId> =
            metrics.membership_config.membership().voter_ids().collect();
        for (id, node) in metrics.membership_config.membership().nodes() {
            if *id == target && voters.contains(id) {
                return Err(MembershipError::AlreadyMember {
                    node_id: node_id.to_string(),
                });
            }
            if *id != target && node.addr == address {
                return Err(MembershipError::AddressInUse {
                    address: address.to_string(),
                    member: node.name.clone(),
                });
            }
        }

        tracing::info!(node = %node_id, %address, "join requested");

        let admit = async {
            self.raft
                .add_learner(target, MemberNode::new(node_id, address), true)
                .await
                .map_err(membership_error)?;

            self.raft
                .change_membership(ChangeMembers::AddVoterIds(BTreeSet::from([target])), false)
                .await
                .map_err(membership_error)?;

            Ok::<(), MembershipError>(())
        };

        match tokio::time::timeout(self.join_timeout, admit).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(MembershipError::Timeout {
                    node_id: node_id.to_string(),
                    timeout: self.join_timeout,
                });
            }
        }

        tracing::info!(node = %node_id, %address, "node joined successfully");
        Ok(())
    }

    /// Write a command through Raft consensus.
    ///
    /// Waits until the command is committed and applied on this node, and
    /// returns what the state machine produced. Fails with
    /// [`ClusterError::NotLeader`] on a follower.
    pub async fn write(&self, cmd: KvCommand) -> ClusterResult<KvResponse> {
        tracing::debug!(command = cmd.name(), key = cmd.key(), "writing command");

        match self.raft.client_write(cmd).await {
            Ok(resp) => Ok(resp.data),
            Err(e) => Err(write_error(e)),
        }
    }

    /// Read a key from the local replica.
    ///
    /// On a follower the value may lag the leader.
    pub async fn get(&self, key: &str) -> Option<String> {
        self.state_machine.get(key).await
    }

    /// The current membership, sorted by node id.
    pub fn members(&self) -> Vec<ClusterMember> {
        let metrics = self.metrics();
        let voters: BTreeSet<ClusterNodeId> =
            metrics.membership_config.membership().voter_ids().collect();

        let mut members: Vec<ClusterMember> = metrics
            .membership_config
            .membership()
            .nodes()
            .map(|(id, node)| ClusterMember {
                id: node.name.clone(),
                address: node.addr.clone(),
                is_voter: voters.contains(id),
            })
            .collect();
        members.sort_by(|a, b| a.id.cmp(&b.id));
        members
    }

    /// The current leader, if one is known.
    pub fn leader(&self) -> Option<LeaderInfo> {
        let metrics = self.metrics();
        let leader_id = metrics.current_leader?;
        let leader_node = metrics
            .membership_config
            .membership()
            .nodes()
            .find(|(id, _)| **id == leader_id)
            .map(|(_, node)| node.clone());

        Some(LeaderInfo {
            leader_id,
            leader_node,
        })
    }

    /// Check if this node is the leader.
    pub fn is_leader(&self) -> bool {
        self.metrics().current_leader == Some(self.node_id)
    }

    /// Wait until some node is known as leader.
    pub async fn wait_for_leader(&self, timeout: Duration) -> ClusterResult<LeaderInfo> {
        self.raft
            .wait(Some(timeout))
            .metrics(|m| m.current_leader.is_some(), "leader elected")
            .await
            .map_err(|e| ClusterError::Network(e.to_string()))?;

        self.leader()
            .ok_or_else(|| ClusterError::Network("leader lost while waiting".to_string()))
    }

    /// Wait until the membership has exactly `count` voters.
    pub async fn wait_for_voters(&self, count: usize, timeout: Duration) -> ClusterResult<()> {
        self.raft
            .wait(Some(timeout))
            .metrics(
                |m| m.membership_config.membership().voter_ids().count() == count,
                format!("{} voters", count),
            )
            .await
            .map_err(|e| ClusterError::Network(e.to_string()))?;
        Ok(())
    }

    /// Wait until this node has applied the log up to `index`.
    pub async fn wait_for_applied(&self, index: u64, timeout: Duration) -> ClusterResult<()> {
        self.raft
            .wait(Some(timeout))
            .applied_index_at_least(Some(index), format!("applied {}", index))
            .await
            .map_err(|e| ClusterError::Network(e.to_string()))?;
        Ok(())
    }

    /// This node's identity.
    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    /// Get this node's Raft ID.
    pub fn node_id(&self) -> ClusterNodeId {
        self.node_id
    }

    /// Address the consensus transport is actually bound to.
    pub fn raft_addr(&self) -> SocketAddr {
        self.raft_addr
    }

    /// Lifecycle state.
    pub fn state(&self) -> NodeState {
        self.lifecycle.current()
    }

    /// Get a reference to the state machine for read-only queries.
    pub fn state_machine(&self) -> &Arc<KvStateMachine> {
        &self.state_machine
    }

    /// Get a reference to the durable log store.
    pub fn log_store(&self) -> &LogStore {
        &self.log_store
    }

    /// Get cluster metrics.
    pub fn metrics(&self) -> ClusterMetrics {
        self.raft.metrics().borrow().clone()
    }

    /// Trigger a snapshot and return once it has been requested.
    pub async fn trigger_snapshot(&self) -> ClusterResult<()> {
        self.raft
            .trigger()
            .snapshot()
            .await
            .map_err(|e| ClusterError::Storage(format!("failed to trigger snapshot: {}", e)))?;
        Ok(())
    }

    /// Stop Raft and the consensus transport.
    ///
    /// Calling this more than once is a no-op.
    pub async fn shutdown(&self) -> ClusterResult<()> {
        if !self.lifecycle.begin_shutdown() {
            tracing::debug!(node = %self.identity.id, "shutdown already in progress");
            return Ok(());
        }

        self.transport_shutdown.cancel();

        let result = self
            .raft
            .shutdown()
            .await
            .map_err(|e| ClusterError::Storage(format!("Shutdown error: {}", e)));

        let task = self.transport_task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }

        self.lifecycle.transition(NodeState::Stopped)?;
        tracing::info!(node = %self.identity.id, "cluster node stopped");
        result
    }
}

impl Drop for ClusterNode {
    fn drop(&mut self) {
        self.transport_shutdown.cancel();
    }
}

/// Convert a failed client write into a ClusterError.
fn write_error(e: ClusterRaftWriteError) -> ClusterError {
    if is_forward_to_leader(&e) {
        return ClusterError::NotLeader {
            leader: extract_forward_to_leader(&e).map(|info| info.describe()),
        };
    }

    match e {
        RaftError::Fatal(fatal) => ClusterError::Raft(Box::new(RaftError::Fatal(fatal))),
        RaftError::APIError(api) => ClusterError::Storage(api.to_string()),
    }
}

/// Convert a failed membership change into a MembershipError.
fn membership_error(e: ClusterRaftWriteError) -> MembershipError {
    if is_forward_to_leader(&e) {
        return MembershipError::NotLeader {
            leader: extract_forward_to_leader(&e).map(|info| info.describe()),
        };
    }
    MembershipError::Rejected(e.to_string())
}
