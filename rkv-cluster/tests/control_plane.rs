//! HTTP control plane tests against launched runtimes.

mod common;

use bytes::Bytes;
use common::{WAIT, test_config};
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, StatusCode};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use rkv_cluster::{ClusterError, ClusterNode, NodeRuntime, NodeState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A runtime serving in the background.
struct Running {
    node: Arc<ClusterNode>,
    http: SocketAddr,
    token: CancellationToken,
    task: JoinHandle<rkv_cluster::ClusterResult<()>>,
}

impl Running {
    fn spawn(runtime: NodeRuntime) -> Self {
        let node = Arc::clone(runtime.node());
        let http = runtime.http_addr();
        let token = CancellationToken::new();
        let task = tokio::spawn(runtime.run(token.clone()));
        Self {
            node,
            http,
            token,
            task,
        }
    }

    async fn stop(self) -> rkv_cluster::ClusterResult<()> {
        self.token.cancel();
        self.task.await.expect("runtime task")
    }
}

async fn launch_leader(dir: &TempDir) -> Running {
    let config = test_config("n1", dir.path()).build().unwrap();
    let runtime = NodeRuntime::launch(config).await.unwrap();
    runtime.node().wait_for_leader(WAIT).await.unwrap();
    Running::spawn(runtime)
}

/// Send request headers and the first half of a 10-byte PUT body.
async fn start_slow_put(addr: SocketAddr) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(
            b"PUT /kv/slow HTTP/1.1\r\nHost: localhost\r\nContent-Length: 10\r\n\
              Connection: close\r\n\r\nhello",
        )
        .await
        .unwrap();
    // Let the server accept the connection and start reading the body.
    tokio::time::sleep(Duration::from_millis(200)).await;
    stream
}

async fn call(
    method: Method,
    addr: SocketAddr,
    path: &str,
    body: impl Into<Bytes>,
) -> (StatusCode, serde_json::Value) {
    let client: Client<_, Full<Bytes>> = Client::builder(TokioExecutor::new()).build_http();
    let req = Request::builder()
        .method(method)
        .uri(format!("http://{}{}", addr, path))
        .body(Full::new(body.into()))
        .unwrap();

    let resp = client.request(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn join_endpoint_status_codes() {
    let dir = TempDir::new().unwrap();
    let leader = launch_leader(&dir).await;

    let (status, body) = call(Method::POST, leader.http, "/join", "not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"].is_string());

    let own = serde_json::json!({
        "address": leader.node.identity().bind_address,
        "node_id": "n1"
    });
    let (status, body) = call(Method::POST, leader.http, "/join", own.to_string()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(
        body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("already a voting member")
    );

    let (status, _) = call(Method::GET, leader.http, "/join", "").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    leader.stop().await.unwrap();
}

#[tokio::test]
async fn node_joins_through_peer_at_startup() {
    let dir1 = TempDir::new().unwrap();
    let dir2 = TempDir::new().unwrap();
    let leader = launch_leader(&dir1).await;

    let config = test_config("n2", dir2.path())
        .join_addr(leader.http.to_string())
        .build()
        .unwrap();
    let joiner = Running::spawn(NodeRuntime::launch(config).await.unwrap());

    leader.node.wait_for_voters(2, WAIT).await.unwrap();
    let members = leader.node.members();
    assert_eq!(members[1].id, "n2");
    assert_eq!(members[1].address, joiner.node.identity().bind_address);

    let (status, body) = call(Method::GET, joiner.http, "/status", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["members"].as_array().unwrap().len(), 2);

    joiner.stop().await.unwrap();
    leader.stop().await.unwrap();
}

#[tokio::test]
async fn refused_startup_join_keeps_node_running() {
    let dir1 = TempDir::new().unwrap();
    let dir2 = TempDir::new().unwrap();
    let leader = launch_leader(&dir1).await;

    // Same id as the leader: the peer answers 500 and the joiner stays up
    let config = test_config("n1", dir2.path())
        .join_addr(leader.http.to_string())
        .build()
        .unwrap();
    let joiner = NodeRuntime::launch(config).await.unwrap();
    assert_eq!(joiner.node().state(), NodeState::Running);
    assert_eq!(leader.node.members().len(), 1);

    let joiner = Running::spawn(joiner);
    joiner.stop().await.unwrap();
    leader.stop().await.unwrap();
}

#[tokio::test]
async fn unreachable_peer_fails_launch() {
    let dir = TempDir::new().unwrap();
    let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let peer = closed.local_addr().unwrap().to_string();
    drop(closed);

    let config = test_config("n2", dir.path()).join_addr(peer).build().unwrap();
    let err = NodeRuntime::launch(config).await.err().unwrap();
    assert!(matches!(err, rkv_cluster::ClusterError::Network(_)));
}

#[tokio::test]
async fn kv_over_http() {
    let dir = TempDir::new().unwrap();
    let leader = launch_leader(&dir).await;

    let (status, body) = call(Method::PUT, leader.http, "/kv/greeting", "hello").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["previous"].is_null());

    let (status, body) = call(Method::GET, leader.http, "/kv/greeting", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["value"], "hello");

    let (status, body) = call(Method::DELETE, leader.http, "/kv/greeting", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["previous"], "hello");

    let (status, _) = call(Method::GET, leader.http, "/kv/greeting", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(Method::POST, leader.http, "/snapshot", "").await;
    assert_eq!(status, StatusCode::ACCEPTED);

    leader.stop().await.unwrap();
}

#[tokio::test]
async fn follower_write_is_unavailable() {
    let dir1 = TempDir::new().unwrap();
    let dir2 = TempDir::new().unwrap();
    let leader = launch_leader(&dir1).await;

    let config = test_config("n2", dir2.path())
        .join_addr(leader.http.to_string())
        .build()
        .unwrap();
    let joiner = Running::spawn(NodeRuntime::launch(config).await.unwrap());
    joiner.node.wait_for_leader(WAIT).await.unwrap();

    let (status, body) = call(Method::PUT, joiner.http, "/kv/k", "v").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "E301");

    joiner.stop().await.unwrap();
    leader.stop().await.unwrap();
}

#[tokio::test]
async fn cancellation_stops_node() {
    let dir = TempDir::new().unwrap();
    let leader = launch_leader(&dir).await;
    let node = Arc::clone(&leader.node);

    // A second cancel is a no-op
    leader.token.cancel();
    leader.stop().await.unwrap();

    assert_eq!(node.state(), NodeState::Stopped);
    node.shutdown().await.unwrap();
}

#[tokio::test]
async fn request_in_flight_at_shutdown_completes() {
    let dir = TempDir::new().unwrap();
    let leader = launch_leader(&dir).await;
    let node = Arc::clone(&leader.node);

    let mut stream = start_slow_put(leader.http).await;
    leader.token.cancel();
    tokio::time::sleep(Duration::from_millis(100)).await;

    stream.write_all(b"world").await.unwrap();
    let mut response = Vec::new();
    tokio::time::timeout(WAIT, stream.read_to_end(&mut response))
        .await
        .expect("response before timeout")
        .unwrap();
    let response = String::from_utf8_lossy(&response);
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.contains(r#""key":"slow""#), "{response}");

    leader.task.await.unwrap().unwrap();
    assert_eq!(node.state(), NodeState::Stopped);
}

#[tokio::test]
async fn stalled_request_exceeds_grace() {
    let dir = TempDir::new().unwrap();
    let grace = Duration::from_millis(300);
    let config = test_config("n1", dir.path())
        .shutdown_grace(grace)
        .build()
        .unwrap();
    let runtime = NodeRuntime::launch(config).await.unwrap();
    runtime.node().wait_for_leader(WAIT).await.unwrap();
    let leader = Running::spawn(runtime);
    let node = Arc::clone(&leader.node);

    // The body is never finished.
    let _stream = start_slow_put(leader.http).await;

    let result = tokio::time::timeout(WAIT, leader.stop())
        .await
        .expect("runtime returns after the grace period");
    assert!(
        matches!(result, Err(ClusterError::ShutdownTimeout { grace: g }) if g == grace),
        "{result:?}"
    );
    // The node is stopped even though the drain was cut short.
    assert_eq!(node.state(), NodeState::Stopped);
}
