//! Non-Linux stand-in for [`MountPrimitives`]. Every FUSE-touching
//! operation returns [`Error::Unsupported`] so the crate still builds,
//! and unit tests unrelated to the kernel mount path still run, on a
//! developer's non-Linux machine.

use std::os::fd::OwnedFd;
use std::path::{Path, PathBuf};

use mountpoint_csi_args::MountOptions;

use crate::error::{Error, Result};
use crate::platform::MountPrimitives;
use crate::types::{MountCall, MountState};

/// Stub implementation used on every target except Linux.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedMountPrimitives;

impl UnsupportedMountPrimitives {
    /// Creates a new instance.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl MountPrimitives for UnsupportedMountPrimitives {
    fn check_mountpoint(&self, _target: &Path) -> Result<MountState> {
        Err(Error::Unsupported)
    }

    fn is_corrupted(&self, _target: &Path) -> Result<bool> {
        Err(Error::Unsupported)
    }

    fn unmount(&self, _target: &Path) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn find_references_to_mountpoint(&self, _source: &Path) -> Result<Vec<PathBuf>> {
        Err(Error::Unsupported)
    }

    fn open_fuse_device(&self) -> Result<OwnedFd> {
        Err(Error::Unsupported)
    }

    fn create_mount_call(&self, _fd: &OwnedFd, _target: &Path, _options: &MountOptions) -> Result<MountCall> {
        Err(Error::Unsupported)
    }

    fn perform_mount(&self, _target: &Path, _call: &MountCall) -> Result<()> {
        Err(Error::Unsupported)
    }

    fn bind_mount(&self, _source: &Path, _target: &Path) -> Result<()> {
        Err(Error::Unsupported)
    }
}
