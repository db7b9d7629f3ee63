//! Error types for the object-storage adapter.

use thiserror::Error;

/// Result type alias for object-storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors the object-storage adapter can report.
///
/// Every operation passes through the underlying SDK error unchanged
/// except where the adapter's contract says otherwise:
/// `CreateBucket` treats "already exists/owned by you" as success and
/// `DeleteBucket` treats "bucket not found" and "bucket not empty" as
/// success.
#[derive(Debug, Error)]
pub enum Error {
    /// The backing object-storage API returned an error this adapter could
    /// not special-case into success.
    #[error("object storage request failed for bucket {bucket}: {source}")]
    Backend {
        /// The bucket the failing request was for.
        bucket: String,
        /// The underlying SDK error, as a display string (kept
        /// type-erased so this crate doesn't leak the AWS SDK's error
        /// hierarchy across the workspace boundary).
        source: String,
    },

    /// The client could not be constructed (bad endpoint URL, missing
    /// region, etc).
    #[error("failed to build object storage client: {0}")]
    ClientConfig(String),
}
