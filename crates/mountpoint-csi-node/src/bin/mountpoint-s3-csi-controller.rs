#![allow(clippy::expect_used)]
//! Controller plugin binary: serves the CSI `Identity`/`Controller`
//! surface over a Unix-domain socket. Runs once per
//! cluster rather than once per node.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::UnixListener;
use tokio_stream::wrappers::UnixListenerStream;
use tonic::transport::Server;
use tracing::info;

use mountpoint_csi_creds::CredentialProvider;
use mountpoint_csi_node::controller::{ControllerService, S3StoreFactory};
use mountpoint_csi_node::identity::IdentityService;
use mountpoint_csi_node::secrets::KubeSecretSource;
use mountpoint_csi_node::{ControllerConfig, DriverError};
use mountpoint_csi_proto::csi::controller_server::ControllerServer;
use mountpoint_csi_proto::csi::identity_server::IdentityServer;

/// mountpoint-s3-csi-controller: the cluster-scoped CSI plugin
/// providing dynamic bucket provisioning.
#[derive(Parser, Debug, Clone)]
#[command(name = "mountpoint-s3-csi-controller")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a JSON configuration file.
    #[arg(short, long, env = "MOUNTPOINT_CSI_CONTROLLER_CONFIG")]
    config: PathBuf,

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

    let config = ControllerConfig::from_file(&cli.config)?;
    config.validate()?;
    info!(endpoint = %config.endpoint_url, socket = %config.socket_path.display(), "controller configuration loaded");

    let client = kube::Client::try_default()
        .await
        .map_err(|e| DriverError::ClusterClient(e.to_string()))?;

    let credentials = CredentialProvider::with_cache_settings(
        KubeSecretSource::new(client),
        mountpoint_csi_creds::driver_credentials_from_env(),
        config.credential_cache_capacity,
        Duration::from_secs(config.credential_cache_ttl_secs),
    );
    let factory = S3StoreFactory::new(config.endpoint_url.clone(), config.default_region.clone());
    let controller_service = ControllerService::new(factory, credentials);

    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path).map_err(|e| DriverError::Serve(e.to_string()))?;
    }
    if let Some(parent) = config.socket_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| DriverError::Serve(e.to_string()))?;
    }
    let listener = UnixListener::bind(&config.socket_path).map_err(|e| DriverError::Serve(e.to_string()))?;
    info!(socket = %config.socket_path.display(), "controller plugin listening");

    Server::builder()
        .add_service(IdentityServer::new(IdentityService::new()))
        .add_service(ControllerServer::new(controller_service))
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
        eprintln!("mountpoint-s3-csi-controller error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse_args(args: &[&str]) -> Result<Cli, clap::Error> {
        let mut full_args = vec!["mountpoint-s3-csi-controller"];
        full_args.extend(args);
        Cli::try_parse_from(full_args)
    }

    #[test]
    fn requires_config_path() {
        assert!(parse_args(&[]).is_err());
    }

    #[test]
    fn parses_config_path() {
        let cli = parse_args(&["--config", "/etc/csi/controller.json"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/csi/controller.json"));
    }
}
