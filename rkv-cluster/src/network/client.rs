//! Network client implementing OpenRaft's RaftNetwork trait.

use super::{APPEND_PATH, SNAPSHOT_PATH, VOTE_PATH};
use crate::error::{RPCError, RaftError};
use crate::types::{ClusterNodeId, MemberNode, TypeConfig};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use openraft::error::{InstallSnapshotError, NetworkError, RemoteError, Unreachable};
use openraft::network::{RPCOption, RaftNetwork, RaftNetworkFactory};
use openraft::raft::{
    AppendEntriesRequest, AppendEntriesResponse, InstallSnapshotRequest, InstallSnapshotResponse,
    VoteRequest, VoteResponse,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Factory for creating network connections to other nodes.
///
/// All connections share one pooled HTTP client.
#[derive(Clone)]
pub struct RaftNetworkClient {
    http: Client<HttpConnector, Full<Bytes>>,
    timeout: Duration,
}

impl RaftNetworkClient {
    /// Create a new network client with the given per-RPC timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            http: Client::builder(TokioExecutor::new()).build_http(),
            timeout,
        }
    }
}

impl RaftNetworkFactory<TypeConfig> for RaftNetworkClient {
    type Network = RaftPeerConnection;

    async fn new_client(&mut self, target: ClusterNodeId, node: &MemberNode) -> Self::Network {
        RaftPeerConnection {
            target,
            node: node.clone(),
            client: self.clone(),
        }
    }
}

/// A connection to a specific node.
pub struct RaftPeerConnection {
    /// Target node ID.
    target: ClusterNodeId,
    /// Target name and address.
    node: MemberNode,
    /// Reference to the client factory.
    client: RaftNetworkClient,
}

impl RaftPeerConnection {
    /// POST `req` to `path` on the target and decode openraft's reply.
    async fn send<Req, Resp, E>(&self, path: &str, req: &Req) -> Result<Resp, RPCError<E>>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
        E: std::error::Error + DeserializeOwned,
    {
        let body = serde_json::to_vec(req).map_err(|e| to_network_error(&e))?;

        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("http://{}{}", self.node.addr, path))
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| to_network_error(&e))?;

        let response = tokio::time::timeout(self.client.timeout, self.client.http.request(request))
            .await
            .map_err(|_| {
                to_unreachable_error(&std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("{} timed out after {:?}", path, self.client.timeout),
                ))
            })?
            .map_err(|e| to_unreachable_error(&e))?;

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| to_network_error(&e))?
            .to_bytes();

        if !status.is_success() {
            let message = format!(
                "{} {} from {}: {}",
                path,
                status,
                self.node,
                String::from_utf8_lossy(&bytes)
            );
            return Err(to_network_error(&std::io::Error::other(message)));
        }

        let result: Result<Resp, RaftError<E>> =
            serde_json::from_slice(&bytes).map_err(|e| to_network_error(&e))?;

        result.map_err(|e| openraft::error::RPCError::RemoteError(RemoteError::new(self.target, e)))
    }
}

impl RaftNetwork<TypeConfig> for RaftPeerConnection {
    async fn append_entries(
        &mut self,
        req: AppendEntriesRequest<TypeConfig>,
        _option: RPCOption,
    ) -> Result<AppendEntriesResponse<ClusterNodeId>, RPCError> {
        self.send(APPEND_PATH, &req).await
    }

    async fn install_snapshot(
        &mut self,
        req: InstallSnapshotRequest<TypeConfig>,
        _option: RPCOption,
    ) -> Result<InstallSnapshotResponse<ClusterNodeId>, RPCError<InstallSnapshotError>> {
        self.send(SNAPSHOT_PATH, &req).await
    }

    async fn vote(
        &mut self,
        req: VoteRequest<ClusterNodeId>,
        _option: RPCOption,
    ) -> Result<VoteResponse<ClusterNodeId>, RPCError> {
        self.send(VOTE_PATH, &req).await
    }
}

/// Helper to create a NetworkError (the peer answered, but not usefully).
fn to_network_error<E: std::error::Error>(err: &(impl std::error::Error + 'static)) -> RPCError<E> {
    openraft::error::RPCError::Network(NetworkError::new(err))
}

/// Helper to create an Unreachable error (the peer could not be reached).
fn to_unreachable_error<E: std::error::Error>(
    err: &(impl std::error::Error + 'static),
) -> RPCError<E> {
    openraft::error::RPCError::Unreachable(Unreachable::new(err))
}
