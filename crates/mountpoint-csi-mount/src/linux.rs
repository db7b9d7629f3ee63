//! Linux implementation of [`MountPrimitives`] over `nix` and
//! `/proc/mounts`.

use std::os::fd::{FromRawFd, OwnedFd};
use std::path::{Path, PathBuf};

use nix::fcntl::{open, OFlag};
use nix::mount::{mount, umount2, MntFlags, MsFlags};
use nix::sys::stat::{stat, Mode, SFlag};
use nix::unistd::{getgid, getuid};
use proc_mounts::MountIter;
use tracing::{debug, warn};

use mountpoint_csi_args::MountOptions;

use crate::error::{Error, Result};
use crate::platform::MountPrimitives;
use crate::types::{MountCall, MountFlags, MountState, MOUNTER_DEVICE_NAME};

/// Linux mount primitives. Stateless; every call re-reads `/proc/mounts`
/// since the mount table is the single source of truth (Design Note
/// "Idempotence everywhere": observe, then act).
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxMountPrimitives;

impl LinuxMountPrimitives {
    /// Creates a new instance. Carries no state of its own.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn canonical(path: &Path) -> PathBuf {
        std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
    }
}

impl MountPrimitives for LinuxMountPrimitives {
    fn check_mountpoint(&self, target: &Path) -> Result<MountState> {
        if !target.exists() {
            return Ok(MountState::NotMounted);
        }
        let target = Self::canonical(target);

        let mounts = MountIter::new().map_err(|e| Error::Io {
            path: "/proc/mounts".to_string(),
            source: e.to_string(),
        })?;

        let mut found_other = false;
        for entry in mounts {
            let entry = entry.map_err(|e| Error::Io {
                path: "/proc/mounts".to_string(),
                source: e.to_string(),
            })?;
            if Self::canonical(&entry.dest) != target {
                continue;
            }
            let source = entry.source.to_string_lossy();
            if source == MOUNTER_DEVICE_NAME {
                return Ok(MountState::MountedByDriver);
            }
            found_other = true;
        }

        Ok(if found_other {
            MountState::MountedByOther
        } else {
            MountState::NotMounted
        })
    }

    fn is_corrupted(&self, target: &Path) -> Result<bool> {
        if self.check_mountpoint(target)? != MountState::MountedByDriver {
            return Ok(false);
        }
        match std::fs::metadata(target) {
            Ok(_) => Ok(false),
            // ENOTCONN is the canonical errno the kernel returns for a
            // FUSE mount whose server process has exited.
            Err(e) if e.raw_os_error() == Some(libc_enotconn()) => {
                warn!(target = %target.display(), "detected corrupted FUSE mount");
                Ok(true)
            }
            Err(e) => Err(Error::Io {
                path: target.display().to_string(),
                source: e.to_string(),
            }),
        }
    }

    fn unmount(&self, target: &Path) -> Result<()> {
        umount2(target, MntFlags::empty()).or_else(|_| {
            debug!(target = %target.display(), "plain unmount failed, retrying detached");
            umount2(target, MntFlags::MNT_DETACH)
        })
        .map_err(|e| Error::Syscall {
            operation: "umount2",
            target: target.display().to_string(),
            source: e.to_string(),
        })
    }

    fn find_references_to_mountpoint(&self, source: &Path) -> Result<Vec<PathBuf>> {
        let source = Self::canonical(source);
        let mounts = MountIter::new().map_err(|e| Error::Io {
            path: "/proc/mounts".to_string(),
            source: e.to_string(),
        })?;

        let mut references = Vec::new();
        for entry in mounts {
            let entry = entry.map_err(|e| Error::Io {
                path: "/proc/mounts".to_string(),
                source: e.to_string(),
            })?;
            if entry.dest == source {
                continue;
            }
            if Self::canonical(&entry.source) == source {
                references.push(entry.dest);
            }
        }
        Ok(references)
    }

    fn open_fuse_device(&self) -> Result<OwnedFd> {
        let raw = open("/dev/fuse", OFlag::O_RDWR, Mode::empty()).map_err(|e| Error::Syscall {
            operation: "open /dev/fuse",
            target: "/dev/fuse".to_string(),
            source: e.to_string(),
        })?;
        // Safety: `open` just returned this fd; nothing else owns it yet.
        #[allow(unsafe_code)]
        Ok(unsafe { OwnedFd::from_raw_fd(raw) })
    }

    fn create_mount_call(&self, fd: &OwnedFd, target: &Path, options: &MountOptions) -> Result<MountCall> {
        use std::os::fd::AsRawFd;

        let meta = stat(target).map_err(|e| Error::Syscall {
            operation: "stat",
            target: target.display().to_string(),
            source: e.to_string(),
        })?;
        let rootmode = meta.st_mode & SFlag::S_IFMT.bits();

        let uid = options.uid().unwrap_or_else(|| getuid().as_raw());
        let gid = options.gid().unwrap_or_else(|| getgid().as_raw());

        let mut opt_string = format!(
            "fd={},rootmode={:o},user_id={},group_id={},default_permissions",
            fd.as_raw_fd(),
            rootmode,
            uid,
            gid
        );
        if options.allows_other_or_root() {
            opt_string.push_str(",allow_other");
        }

        Ok(MountCall {
            options: opt_string,
            flags: MountFlags {
                nodev: true,
                nosuid: true,
                noatime: true,
                read_only: options.read_only(),
            },
        })
    }

    fn perform_mount(&self, target: &Path, call: &MountCall) -> Result<()> {
        let mut flags = MsFlags::MS_NODEV | MsFlags::MS_NOSUID | MsFlags::MS_NOATIME;
        if call.flags.read_only {
            flags |= MsFlags::MS_RDONLY;
        }

        mount(
            Some(MOUNTER_DEVICE_NAME),
            target,
            Some("fuse"),
            flags,
            Some(call.options.as_str()),
        )
        .map_err(|e| Error::Syscall {
            operation: "mount",
            target: target.display().to_string(),
            source: e.to_string(),
        })
    }

    fn bind_mount(&self, source: &Path, target: &Path) -> Result<()> {
        mount(
            Some(source),
            target,
            None::<&str>,
            MsFlags::MS_BIND,
            None::<&str>,
        )
        .map_err(|e| Error::Syscall {
            operation: "bind mount",
            target: target.display().to_string(),
            source: e.to_string(),
        })
    }
}

fn libc_enotconn() -> i32 {
    // nix re-exports errno values through `nix::errno::Errno`.
    nix::errno::Errno::ENOTCONN as i32
}
