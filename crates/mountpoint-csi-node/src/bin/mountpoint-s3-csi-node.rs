#![allow(clippy::expect_used)]
//! Node plugin binary: serves the CSI `Identity`/`Node` surface over a
//! Unix-domain socket.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::UnixListener;
use tokio_stream::wrappers::UnixListenerStream;
use tonic::transport::Server;
use tracing::info;

use mountpoint_csi_attach::{KubeAttachmentCoordinator, KubeMounterWorkloadManager};
use mountpoint_csi_creds::CredentialProvider;
use mountpoint_csi_mount::DefaultMountPrimitives;
use mountpoint_csi_node::identity::IdentityService;
use mountpoint_csi_node::node::NodeService;
use mountpoint_csi_node::secrets::KubeSecretSource;
use mountpoint_csi_node::state::PublishState;
use mountpoint_csi_node::{DriverError, NodeConfig};
use mountpoint_csi_proto::csi::identity_server::IdentityServer;
use mountpoint_csi_proto::csi::node_server::NodeServer;

/// mountpoint-s3-csi-node: the per-node CSI plugin.
#[derive(Parser, Debug, Clone)]
#[command(name = "mountpoint-s3-csi-node")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a JSON configuration file.
    #[arg(short, long, env = "MOUNTPOINT_CSI_NODE_CONFIG")]
    config: PathBuf,

    /// Override the configured node name (falls back to the `NODE_NAME`
    /// environment variable the platform injects, then the config
    /// file).
    #[arg(long, env = "NODE_NAME")]
    node_name: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("mountpoint_csi_node=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mountpoint_csi_node=info,warn"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

async fn run(cli: Cli) -> Result<(), DriverError> {
    init_tracing(cli.verbose);

    let mut config = NodeConfig::from_file(&cli.config)?;
    if let Some(node_name) = cli.node_name {
        config.node_name = node_name;
    }
    config.validate()?;
    info!(node_name = %config.node_name, socket = %config.socket_path.display(), "node plugin configuration loaded");

    let client = kube::Client::try_default()
        .await
        .map_err(|e| DriverError::ClusterClient(e.to_string()))?;

    let credentials = CredentialProvider::with_cache_settings(
        KubeSecretSource::new(client.clone()),
        mountpoint_csi_creds::driver_credentials_from_env(),
        config.credential_cache_capacity,
        Duration::from_secs(config.credential_cache_ttl_secs),
    );
    let coordinator = KubeAttachmentCoordinator::new(client.clone(), config.namespace.clone());
    let workload = KubeMounterWorkloadManager::new(
        client,
        config.namespace.clone(),
        config.mounter_image.clone(),
        DefaultMountPrimitives::new(),
    );

    let node_service = NodeService::new(
        config.node_name.clone(),
        config.endpoint_url.clone(),
        config.default_region.clone(),
        coordinator,
        workload,
        DefaultMountPrimitives::new(),
        credentials,
        PublishState::open(&config.state_path),
        Duration::from_secs(config.workload_ready_deadline_secs),
        Duration::from_secs(config.publish_deadline_secs),
    );

    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path).map_err(|e| DriverError::Serve(e.to_string()))?;
    }
    if let Some(parent) = config.socket_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| DriverError::Serve(e.to_string()))?;
    }
    let listener = UnixListener::bind(&config.socket_path).map_err(|e| DriverError::Serve(e.to_string()))?;
    info!(socket = %config.socket_path.display(), "node plugin listening");

    Server::builder()
        .add_service(IdentityServer::new(IdentityService::new()))
        .add_service(NodeServer::new(node_service))
        .serve_with_incoming(UnixListenerStream::new(listener))
        .await
        .map_err(|e| DriverError::Serve(e.to_string()))
}

fn main() {
    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to create tokio runtime");

    if let Err(e) = runtime.block_on(run(cli)) {
        eprintln!("mountpoint-s3-csi-node error: {e}");
        std::process::exit(1);
    }
}
