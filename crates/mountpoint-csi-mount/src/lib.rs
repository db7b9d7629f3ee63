//! Mount primitives (component B): FUSE device handling, kernel mount
//! option construction, and mount-table inspection, behind a platform
//! trait so the bulk of the driver stays testable off Linux.

#![warn(missing_docs)]

pub mod error;
pub mod platform;
pub mod types;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(not(target_os = "linux"))]
mod other;

pub use error::{Error, Result};
pub use platform::MountPrimitives;
pub use types::{MountCall, MountFlags, MountState, MOUNTER_DEVICE_NAME};

#[cfg(target_os = "linux")]
pub use linux::LinuxMountPrimitives as DefaultMountPrimitives;
#[cfg(not(target_os = "linux"))]
pub use other::UnsupportedMountPrimitives as DefaultMountPrimitives;
