//! HTTP server setup and connection handling.

use super::router;
use super::state::AppState;
use crate::error::{ClusterError, ClusterResult};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// HTTP control plane for one node.
pub struct ApiServer {
    /// Bound listener.
    listener: TcpListener,
    /// Shared application state.
    state: Arc<AppState>,
    /// Address the listener is bound to.
    local_addr: SocketAddr,
}

impl ApiServer {
    /// Bind the control plane on `addr`.
    pub async fn bind(addr: &str, state: Arc<AppState>) -> ClusterResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ClusterError::resource(format!("control plane listener on {}", addr), e))?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            listener,
            state,
            local_addr,
        })
    }

    /// Address the control plane is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Get a reference to the application state.
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Serve requests until `shutdown` is cancelled, then drain.
    ///
    /// In-flight requests get `grace` to finish. If they do not, the
    /// remaining connections are abandoned and
    /// [`ClusterError::ShutdownTimeout`] is returned.
    pub async fn run(self, shutdown: CancellationToken, grace: Duration) -> ClusterResult<()> {
        let graceful = GracefulShutdown::new();

        tracing::info!(addr = %self.local_addr, "API server started");

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    let (stream, remote_addr) = match result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            tracing::warn!(error = %e, "API accept failed");
                            continue;
                        }
                    };

                    let io = TokioIo::new(stream);
                    let state = Arc::clone(&self.state);
                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { router::route(req, state).await }
                    });

                    let conn = graceful.watch(http1::Builder::new().serve_connection(io, service));
                    tokio::spawn(async move {
                        if let Err(e) = conn.await {
                            if !e.is_incomplete_message() {
                                tracing::warn!(
                                    remote = %remote_addr,
                                    error = %e,
                                    "HTTP connection error"
                                );
                            }
                        }
                    });
                }
                _ = shutdown.cancelled() => {
                    tracing::info!(addr = %self.local_addr, "API server shutting down");
                    break;
                }
            }
        }

        drop(self.listener);

        match tokio::time::timeout(grace, graceful.shutdown()).await {
            Ok(()) => {
                tracing::info!("API server drained");
                Ok(())
            }
            Err(_) => {
                tracing::warn!(?grace, "API server did not drain in time");
                Err(ClusterError::ShutdownTimeout { grace })
            }
        }
    }
}
