//! Platform-agnostic types shared by the `Linux`/non-Linux
//! [`crate::platform::MountPrimitives`] implementations.

/// The well-known device/filesystem-source name the mounter binary
/// registers under, used to recognize "this driver's mount" among all
/// entries in the node's mount table.
pub const MOUNTER_DEVICE_NAME: &str = "mountpoint-s3";

/// Kernel-level flags for the `mount(2)` syscall, independent of the
/// platform crate (`nix`) that ultimately encodes them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MountFlags {
    /// Disallow character/block special devices on the mounted filesystem.
    pub nodev: bool,
    /// Disallow set-user-ID/set-group-ID bits from taking effect.
    pub nosuid: bool,
    /// Do not update inode access times.
    pub noatime: bool,
    /// Mount read-only.
    pub read_only: bool,
}

/// The kernel mount options string plus the flags to pass to `mount(2)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountCall {
    /// The comma-separated `-o` style option string (`fd=`, `rootmode=`,
    /// `user_id=`, `group_id=`, `default_permissions`, `allow_other`).
    pub options: String,
    /// The kernel-level mount flags.
    pub flags: MountFlags,
}

/// The outcome of inspecting whether a target path is mounted by this
/// driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountState {
    /// The path is not a mount point at all.
    NotMounted,
    /// The path is mounted, and it is this driver's mount
    /// ([`MOUNTER_DEVICE_NAME`]).
    MountedByDriver,
    /// The path is mounted by something else entirely (a foreign
    /// filesystem already occupies it).
    MountedByOther,
}
