//! Error types for the mount primitives.

use thiserror::Error;

/// Result type alias for mount-primitive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors the mount primitives can report. Every operation otherwise
/// reports the underlying platform error unchanged.
#[derive(Debug, Error)]
pub enum Error {
    /// The platform's `mount(2)`/`umount2(2)`/`/dev/fuse` surface isn't
    /// available on this target (anything but Linux). Every FUSE-touching
    /// operation returns this so the crate still builds and its non-FUSE
    /// unit tests still run on a developer's laptop.
    #[error("mount primitives are not supported on this platform")]
    Unsupported,

    /// A syscall failed; the message is the platform's own error text.
    #[error("{operation} failed for {target}: {source}")]
    Syscall {
        /// Which operation failed (`mount`, `umount`, `open /dev/fuse`, ...).
        operation: &'static str,
        /// The path the operation was acting on.
        target: String,
        /// The underlying OS error text.
        source: String,
    },

    /// The target path exists but is not a mount point of this driver's
    /// filesystem type — distinct from "not mounted at all" so callers
    /// can tell "must re-mount" (corrupted mount) from "nothing here".
    #[error("{0} is mounted, but not by this driver")]
    ForeignMount(String),

    /// An I/O error reading or creating the target directory, or reading
    /// the mount table.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The path the I/O error occurred on.
        path: String,
        /// The underlying I/O error text.
        source: String,
    },
}
