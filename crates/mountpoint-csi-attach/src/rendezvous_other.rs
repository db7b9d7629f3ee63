//! Non-Linux stand-in for the rendezvous protocol. `SCM_RIGHTS` fd
//! passing has no portable story outside Unix-domain sockets, so this
//! target reports [`mountpoint_csi_mount::Error::Unsupported`] rather
//! than attempting a handoff, matching the platform split already
//! established in `mountpoint-csi-mount`'s `linux`/`other` modules.

use std::os::fd::RawFd;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The rendezvous protocol's wire version, kept in step with the
/// Linux implementation even though this target never speaks it.
pub const PROTOCOL_VERSION: u8 = 1;

/// See the Linux implementation's [`RequestFrame`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestFrame {
    /// The mounter binary's argv.
    pub argv: Vec<String>,
    /// The mounter binary's environment, as `KEY=VALUE` pairs.
    pub env: Vec<String>,
    /// The bucket being mounted.
    pub bucket: String,
    /// The target path the mount will be grafted onto.
    pub target_path: String,
    /// Whether the mount should be read-only.
    pub read_only: bool,
}

/// See the Linux implementation's [`ReplyFrame`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReplyFrame {
    /// The mounter accepted the handoff.
    Ok,
    /// The mounter rejected the handoff.
    Error(String),
}

/// Always fails: fd passing over a rendezvous socket is not available
/// on this target.
///
/// # Errors
///
/// Always returns [`Error::MountPrimitive`] wrapping
/// [`mountpoint_csi_mount::Error::Unsupported`].
pub fn send_mount_request(_socket_path: &Path, _request: &RequestFrame, _fuse_fd: RawFd) -> Result<()> {
    Err(Error::MountPrimitive(mountpoint_csi_mount::Error::Unsupported))
}
