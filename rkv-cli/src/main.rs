//! rkv - launch a node of a Raft-replicated key-value cluster.

mod signals;

use anyhow::{Context, Result};
use clap::Parser;
use rkv_cluster::observability::{LogConfig, LogConfigBuilder, init_logging, verbosity_filter};
use rkv_cluster::{ClusterError, NodeConfig, NodeRuntime};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Run one node of an rkv cluster.
///
/// Without --join the node bootstraps a new single-member cluster. With
/// --join it asks the node at that control-plane address to admit it.
#[derive(Parser, Debug)]
#[command(name = "rkv")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Unique node identifier
    #[arg(long)]
    id: String,

    /// HTTP control-plane bind address
    #[arg(long, default_value = "127.0.0.1:8080")]
    http_addr: String,

    /// Raft consensus bind address
    #[arg(long, default_value = "127.0.0.1:7000")]
    raft_addr: String,

    /// Consensus address advertised to peers (defaults to --raft-addr)
    #[arg(long)]
    advertise_addr: Option<String>,

    /// Control-plane address of an existing member to join
    #[arg(long)]
    join: Option<String>,

    /// Directory for the log and snapshot stores
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn node_config(&self) -> Result<NodeConfig> {
        let mut builder = NodeConfig::builder()
            .node_id(&self.id)
            .http_addr(&self.http_addr)
            .raft_addr(&self.raft_addr)
            .data_dir(&self.data_dir);

        if let Some(addr) = &self.advertise_addr {
            builder = builder.advertise_addr(addr);
        }
        if let Some(peer) = &self.join {
            builder = builder.join_addr(peer);
        }

        builder.build().context("Invalid node configuration")
    }
}

fn setup_logging(verbosity: u8) -> Result<()> {
    let mut builder = LogConfigBuilder::from_config(LogConfig::from_env());
    if let Some(filter) = verbosity_filter(verbosity) {
        builder = builder.filter(filter);
    }
    init_logging(&builder.build())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    let config = cli.node_config()?;
    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .with_context(|| format!("Failed to create data dir {}", config.data_dir.display()))?;

    let runtime = NodeRuntime::launch(config)
        .await
        .context("Failed to start node")?;

    tracing::info!(
        node = %cli.id,
        http = %runtime.http_addr(),
        raft = %runtime.node().raft_addr(),
        "node running, press Ctrl+C to stop"
    );

    let shutdown = CancellationToken::new();
    let signals = tokio::spawn(signals::cancel_on_signal(shutdown.clone()));

    let result = runtime.run(shutdown).await;
    signals.abort();

    match result {
        Ok(()) => {
            tracing::info!(node = %cli.id, "node stopped");
            Ok(())
        }
        Err(ClusterError::ShutdownTimeout { grace }) => {
            tracing::warn!(node = %cli.id, ?grace, "node stopped without a full drain");
            Ok(())
        }
        Err(e) => Err(e).context("Node did not shut down cleanly"),
    }
}
