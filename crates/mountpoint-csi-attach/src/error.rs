//! Error types for the attachment coordinator and mounter-workload
//! manager.

use thiserror::Error;

/// Result type alias for this crate's operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while locating/creating an attachment record, ensuring
/// a mounter workload is running, or handing off a FUSE fd to it.
#[derive(Debug, Error)]
pub enum Error {
    /// The platform API (the cluster's object store for attachment
    /// records and Pods) could not be reached or returned an
    /// unexpected error.
    #[error("cluster API error: {0}")]
    PlatformApi(String),

    /// The mounter workload did not report ready within the publish
    /// deadline.
    #[error("mounter workload {name} did not become ready within {deadline_secs}s")]
    ReadinessTimeout {
        /// The workload's name.
        name: String,
        /// The deadline that was exceeded, in seconds.
        deadline_secs: u64,
    },

    /// The rendezvous socket could not be reached or the handoff
    /// protocol failed.
    #[error("FD handoff to {workload} failed: {reason}")]
    Handoff {
        /// The workload the handoff was attempted against.
        workload: String,
        /// What went wrong.
        reason: String,
    },

    /// The mounter rejected the handoff request explicitly (its own
    /// reply frame carried an error status).
    #[error("mounter {workload} rejected handoff: {reason}")]
    HandoffRejected {
        /// The workload that rejected the request.
        workload: String,
        /// The mounter's reported reason.
        reason: String,
    },

    /// An unpublish found bind-mount references to the target still
    /// outstanding; the caller must retry after the orchestrator
    /// removes them.
    #[error("{count} bind-mount reference(s) to {target} remain; retry after they are removed")]
    ReferencesRemain {
        /// How many references were found.
        count: usize,
        /// The mount target they reference.
        target: String,
    },

    /// Opening the FUSE device failed (delegated to
    /// `mountpoint-csi-mount`).
    #[error("failed to open FUSE device: {0}")]
    MountPrimitive(#[from] mountpoint_csi_mount::Error),
}

impl Error {
    /// True for errors the caller should retry rather than surface as
    /// a terminal failure — the `transient` kind in the shared
    /// taxonomy.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::PlatformApi(_) | Self::ReadinessTimeout { .. } | Self::ReferencesRemain { .. }
        )
    }
}
