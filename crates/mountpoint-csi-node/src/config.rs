//! Driver configuration: a `serde`-derived struct with per-field
//! defaults, loadable from a JSON config file and overridable from the
//! CLI.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::DriverError;

fn default_namespace() -> String {
    "kube-system".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_publish_deadline_secs() -> u64 {
    120
}

fn default_workload_ready_deadline_secs() -> u64 {
    30
}

fn default_credential_cache_capacity() -> usize {
    512
}

fn default_credential_cache_ttl_secs() -> u64 {
    300
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/csi/csi.sock")
}

/// Configuration for the node plugin binary (`mountpoint-s3-csi-node`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Unix-domain socket path the gRPC server listens on.
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// This node's name, as known to the cluster (filled by the
    /// platform; reported verbatim in `NodeGetInfo`).
    pub node_name: String,

    /// Namespace the attachment records and mounter-workload Pods are
    /// created in.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Container image for the mounter workload.
    pub mounter_image: String,

    /// The object-storage endpoint URL (scheme included).
    pub endpoint_url: String,

    /// Default region used when neither the resolved credentials nor
    /// the volume context override it.
    #[serde(default = "default_region")]
    pub default_region: String,

    /// Per-publish deadline in seconds.
    #[serde(default = "default_publish_deadline_secs")]
    pub publish_deadline_secs: u64,

    /// Deadline for a mounter workload to report ready.
    #[serde(default = "default_workload_ready_deadline_secs")]
    pub workload_ready_deadline_secs: u64,

    /// Credential cache capacity.
    #[serde(default = "default_credential_cache_capacity")]
    pub credential_cache_capacity: usize,

    /// Credential cache TTL in seconds.
    #[serde(default = "default_credential_cache_ttl_secs")]
    pub credential_cache_ttl_secs: u64,

    /// Path the node service persists publish state under (the local
    /// `PublishState`; not part of the cluster's durable state,
    /// purely a reconstruction aid for `NodeUnpublishVolume`).
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
}

fn default_state_path() -> PathBuf {
    PathBuf::from("/var/lib/mountpoint-s3-csi/state")
}

impl NodeConfig {
    /// Loads configuration from a JSON file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::ConfigFile`] if the file cannot be read
    /// or does not parse.
    pub fn from_file(path: &Path) -> Result<Self, DriverError> {
        let content = std::fs::read_to_string(path).map_err(|e| DriverError::ConfigFile {
            path: path.display().to_string(),
            source: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| DriverError::ConfigFile {
            path: path.display().to_string(),
            source: e.to_string(),
        })
    }

    /// Validates that required fields are non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Config`] naming the first missing field.
    pub fn validate(&self) -> Result<(), DriverError> {
        if self.node_name.is_empty() {
            return Err(DriverError::Config("node_name is required".to_string()));
        }
        if self.mounter_image.is_empty() {
            return Err(DriverError::Config("mounter_image is required".to_string()));
        }
        if self.endpoint_url.is_empty() {
            return Err(DriverError::Config("endpoint_url is required".to_string()));
        }
        Ok(())
    }
}

/// Configuration for the controller plugin binary
/// (`mountpoint-s3-csi-controller`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Unix-domain socket path the gRPC server listens on.
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// The object-storage endpoint URL (scheme included).
    pub endpoint_url: String,

    /// Default region used when neither request secrets nor the
    /// driver-wide fallback override it.
    #[serde(default = "default_region")]
    pub default_region: String,

    /// Credential cache capacity.
    #[serde(default = "default_credential_cache_capacity")]
    pub credential_cache_capacity: usize,

    /// Credential cache TTL in seconds.
    #[serde(default = "default_credential_cache_ttl_secs")]
    pub credential_cache_ttl_secs: u64,
}

impl ControllerConfig {
    /// Loads configuration from a JSON file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::ConfigFile`] if the file cannot be read
    /// or does not parse.
    pub fn from_file(path: &Path) -> Result<Self, DriverError> {
        let content = std::fs::read_to_string(path).map_err(|e| DriverError::ConfigFile {
            path: path.display().to_string(),
            source: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| DriverError::ConfigFile {
            path: path.display().to_string(),
            source: e.to_string(),
        })
    }

    /// Validates that required fields are non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Config`] naming the first missing field.
    pub fn validate(&self) -> Result<(), DriverError> {
        if self.endpoint_url.is_empty() {
            return Err(DriverError::Config("endpoint_url is required".to_string()));
        }
        Ok(())
    }
}
