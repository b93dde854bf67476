//! HTTP server for handling Raft RPC requests.

use super::{APPEND_PATH, SNAPSHOT_PATH, VOTE_PATH};
use crate::types::{ClusterNodeId, ClusterRaft, TypeConfig};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use openraft::raft::{AppendEntriesRequest, InstallSnapshotRequest, VoteRequest};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::convert::Infallible;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Serves the consensus transport for one Raft instance.
#[derive(Clone)]
pub struct RaftRpcServer {
    /// Reference to the Raft instance.
    raft: ClusterRaft,
}

impl RaftRpcServer {
    /// Create a new Raft server.
    pub fn new(raft: ClusterRaft) -> Self {
        Self { raft }
    }

    /// Accept connections on `listener` until `shutdown` is cancelled.
    ///
    /// Open connections are closed when `shutdown` fires.
    pub async fn serve(self, listener: TcpListener, shutdown: CancellationToken) {
        let local_addr = listener.local_addr().ok();
        tracing::debug!(addr = ?local_addr, "consensus transport listening");

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, remote_addr) = match result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            tracing::warn!(error = %e, "consensus transport accept failed");
                            continue;
                        }
                    };

                    let io = TokioIo::new(stream);
                    let server = self.clone();
                    let shutdown = shutdown.clone();

                    tokio::spawn(async move {
                        let service = service_fn(move |req| {
                            let server = server.clone();
                            async move { server.handle(req).await }
                        });

                        let conn = http1::Builder::new().serve_connection(io, service);
                        tokio::select! {
                            result = conn => {
                                if let Err(e) = result {
                                    if !e.is_incomplete_message() {
                                        tracing::debug!(
                                            remote = %remote_addr,
                                            error = %e,
                                            "consensus connection error"
                                        );
                                    }
                                }
                            }
                            _ = shutdown.cancelled() => {}
                        }
                    });
                }
                _ = shutdown.cancelled() => {
                    tracing::debug!(addr = ?local_addr, "consensus transport stopped");
                    break;
                }
            }
        }
    }

    async fn handle(&self, req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
        if *req.method() != Method::POST {
            return Ok(text(StatusCode::METHOD_NOT_ALLOWED, "use POST"));
        }

        let path = req.uri().path().to_string();
        let body = match req.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => return Ok(text(StatusCode::BAD_REQUEST, &e.to_string())),
        };

        let response = match path.as_str() {
            APPEND_PATH => match decode::<AppendEntriesRequest<TypeConfig>>(&body) {
                Ok(rpc) => encode(&self.raft.append_entries(rpc).await),
                Err(resp) => resp,
            },
            VOTE_PATH => match decode::<VoteRequest<ClusterNodeId>>(&body) {
                Ok(rpc) => encode(&self.raft.vote(rpc).await),
                Err(resp) => resp,
            },
            SNAPSHOT_PATH => match decode::<InstallSnapshotRequest<TypeConfig>>(&body) {
                Ok(rpc) => encode(&self.raft.install_snapshot(rpc).await),
                Err(resp) => resp,
            },
            _ => text(StatusCode::NOT_FOUND, "unknown consensus RPC"),
        };

        Ok(response)
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, Response<Full<Bytes>>> {
    serde_json::from_slice(body).map_err(|e| text(StatusCode::BAD_REQUEST, &e.to_string()))
}

fn encode<T: Serialize>(result: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(result) {
        Ok(json) => Response::builder()
            .status(StatusCode::OK)
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from(json)))
            .expect("response builder should not fail"),
        Err(e) => text(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

fn text(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("content-type", "text/plain")
        .body(Full::new(Bytes::from(message.to_string())))
        .expect("response builder should not fail")
}
