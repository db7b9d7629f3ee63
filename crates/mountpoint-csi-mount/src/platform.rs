//! The narrow platform interface behind which the Linux-only syscall
//! surface (`mount(2)`, `/dev/fuse`, `/proc/mounts`) lives, per Design
//! Note "Multi-platform mount primitives". A non-Linux
//! implementation returns [`crate::error::Error::Unsupported`] from every
//! FUSE-touching operation so the crate builds and its non-FUSE unit
//! tests run on a developer's machine.

use std::os::fd::OwnedFd;
use std::path::{Path, PathBuf};

use mountpoint_csi_args::MountOptions;

use crate::error::Result;
use crate::types::{MountCall, MountState};

/// Platform abstraction: open the FUSE device, build kernel mount
/// options/flags, perform the mount syscall, list/check/unmount, find
/// bind-mount references.
#[allow(async_fn_in_trait)]
pub trait MountPrimitives: Send + Sync {
    /// True iff `target` exists, is listed in the node's mount table, and
    /// the device name equals [`crate::types::MOUNTER_DEVICE_NAME`].
    /// Walks the full mount list, tolerates duplicate entries at the same
    /// path, and resolves symlinks before comparing.
    fn check_mountpoint(&self, target: &Path) -> Result<MountState>;

    /// True if `target` is mounted by this driver but the backing mounter
    /// process has exited — a dedicated predicate distinct from
    /// [`Self::check_mountpoint`], since the orchestrator still sees the
    /// mount entry even after the server died.
    fn is_corrupted(&self, target: &Path) -> Result<bool>;

    /// Invokes the platform unmount syscall.
    fn unmount(&self, target: &Path) -> Result<()>;

    /// The canonical list of bind-mount references to `source`; the
    /// unmount path uses this to decide whether a teardown is safe.
    fn find_references_to_mountpoint(&self, source: &Path) -> Result<Vec<PathBuf>>;

    /// Opens `/dev/fuse` read-write.
    fn open_fuse_device(&self) -> Result<OwnedFd>;

    /// Builds the kernel mount options/flags for a FUSE mount of `fd` at
    /// `target`, honoring `allow_other`/`allow_root` from `options`.
    fn create_mount_call(&self, fd: &OwnedFd, target: &Path, options: &MountOptions) -> Result<MountCall>;

    /// Invokes the kernel mount syscall with filesystem type `fuse` and
    /// device name [`crate::types::MOUNTER_DEVICE_NAME`].
    fn perform_mount(&self, target: &Path, call: &MountCall) -> Result<()>;

    /// Bind-mounts `source` onto `target`. Used to graft a second (or
    /// later) publish's target path onto a mounter workload's existing
    /// FUSE mount when two publishes resolve to the same attachment key.
    fn bind_mount(&self, source: &Path, target: &Path) -> Result<()>;
}
