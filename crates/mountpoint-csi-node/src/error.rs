//! Configuration and startup errors. RPC-path errors flow through
//! [`mountpoint_csi_proto::CsiError`] instead; this type only covers
//! what happens before a gRPC server is even listening.

use thiserror::Error;

/// Errors raised while building configuration or standing up a binary.
#[derive(Debug, Error)]
pub enum DriverError {
    /// A required configuration value was missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Reading or parsing the config file failed.
    #[error("failed to load config from {path}: {source}")]
    ConfigFile {
        /// The path that failed to load.
        path: String,
        /// The underlying I/O or parse error.
        source: String,
    },

    /// Building the Kubernetes client failed.
    #[error("failed to build cluster client: {0}")]
    ClusterClient(String),

    /// Binding or serving the gRPC listener failed.
    #[error("gRPC server error: {0}")]
    Serve(String),
}
