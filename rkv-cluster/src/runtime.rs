//! A running node: consensus plus its HTTP control plane.
//!
//! [`NodeRuntime::launch`] walks the node through startup and, when a peer is
//! configured, asks the peer to admit it. [`NodeRuntime::run`] serves the
//! control plane until the cancellation token fires and then stops
//! everything in order.

use crate::api::{self, ApiServer, AppState, JoinRequest};
use crate::config::NodeConfig;
use crate::error::{ClusterError, ClusterResult};
use crate::raft::ClusterNode;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A started node and its bound control plane.
pub struct NodeRuntime {
    node: Arc<ClusterNode>,
    api: ApiServer,
    config: NodeConfig,
}

impl NodeRuntime {
    /// Start the node, bind the control plane and join the configured peer.
    ///
    /// A peer that cannot be reached fails startup. A peer that answers but
    /// refuses the join is logged and the node keeps running, so an operator
    /// can retry the join against the leader.
    pub async fn launch(config: NodeConfig) -> ClusterResult<Self> {
        let node = Arc::new(ClusterNode::start(config.clone()).await?);

        let state = Arc::new(AppState::new(Arc::clone(&node)));
        let api = match ApiServer::bind(&config.http_addr, state).await {
            Ok(api) => api,
            Err(e) => {
                let _ = node.shutdown().await;
                return Err(e);
            }
        };

        if let Some(peer) = &config.join_addr {
            let identity = node.identity();
            let join = JoinRequest::new(&identity.bind_address, &identity.id);

            match api::request_join(peer, &join, config.join_request_timeout()).await {
                Ok(()) => tracing::info!(%peer, node = %identity.id, "joined cluster"),
                Err(ClusterError::Membership(e)) => {
                    tracing::warn!(%peer, node = %identity.id, error = %e, "join was refused");
                }
                Err(e) => {
                    let _ = node.shutdown().await;
                    return Err(e);
                }
            }
        }

        Ok(Self { node, api, config })
    }

    /// The consensus node.
    pub fn node(&self) -> &Arc<ClusterNode> {
        &self.node
    }

    /// Address the control plane is listening on.
    pub fn http_addr(&self) -> SocketAddr {
        self.api.local_addr()
    }

    /// Serve until `shutdown` is cancelled, then drain and stop the node.
    ///
    /// The node is stopped even when the drain times out; the timeout is
    /// still returned so the caller can report it.
    pub async fn run(self, shutdown: CancellationToken) -> ClusterResult<()> {
        let Self { node, api, config } = self;

        let drained = api.run(shutdown, config.shutdown_grace()).await;
        if let Err(e) = &drained {
            tracing::warn!(node = %node.identity().id, error = %e, "control plane drain incomplete");
        }

        node.shutdown().await?;
        drained
    }
}
