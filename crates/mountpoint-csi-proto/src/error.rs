//! The error taxonomy shared by every component.
//!
//! Component-local crates define their own `thiserror` error type and
//! convert into [`CsiError`] at their public boundary; only
//! `mountpoint-csi-node` converts a `CsiError` into a [`tonic::Status`].

use thiserror::Error;

/// The seven kinds of error the core can report, independent of which
/// component raised them.
#[derive(Debug, Error)]
pub enum CsiError {
    /// Missing volume id, missing target path, forbidden access mode, or
    /// any other input the caller must fix before retrying. Never retried
    /// by the driver.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A semantically inconsistent volume context or secret reference.
    /// Treated the same as [`Self::InvalidArgument`].
    #[error("malformed volume context: {0}")]
    MalformedContext(String),

    /// A secret exists but lacks required fields, or is empty. Never
    /// cached, never retried; reported so an operator can fix the secret.
    #[error("invalid credentials for {reference}: {reason}")]
    InvalidCredentials {
        /// `namespace/name` of the offending secret.
        reference: String,
        /// Which field was missing or empty.
        reason: String,
    },

    /// A platform-API transport error, a credential fetch failure other
    /// than validation, or a workload that did not become ready within its
    /// deadline. Surfaced with a retryable status.
    #[error("transient error: {0}")]
    Transient(String),

    /// The target path exists but the backing mounter process is gone.
    /// Handled locally (unmount and re-publish); never surfaced to a
    /// caller.
    #[error("corrupted mount at {0}")]
    CorruptedMount(String),

    /// The target path is already this driver's mount for this volume.
    /// Treated as success by callers, never actually returned from an RPC,
    /// but kept as a distinct variant so idempotency checks can match on
    /// it explicitly.
    #[error("already mounted: {0}")]
    AlreadyMounted(String),

    /// Anything else. Surfaced as-is, logged with full context.
    #[error("internal error: {0}")]
    Internal(String),

    /// The caller-imposed (or driver-configured) deadline elapsed before
    /// the operation finished. Retryable; side effects already performed
    /// are rolled back in reverse order before this is returned.
    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),
}

impl CsiError {
    /// Shorthand for an [`Self::InvalidArgument`] built from a `Display`.
    #[must_use]
    pub fn invalid_argument(msg: impl std::fmt::Display) -> Self {
        Self::InvalidArgument(msg.to_string())
    }

    /// Shorthand for a [`Self::MalformedContext`] built from a `Display`.
    #[must_use]
    pub fn malformed_context(msg: impl std::fmt::Display) -> Self {
        Self::MalformedContext(msg.to_string())
    }

    /// Shorthand for a [`Self::Transient`] built from a `Display`.
    #[must_use]
    pub fn transient(msg: impl std::fmt::Display) -> Self {
        Self::Transient(msg.to_string())
    }

    /// Shorthand for an [`Self::Internal`] built from a `Display`.
    #[must_use]
    pub fn internal(msg: impl std::fmt::Display) -> Self {
        Self::Internal(msg.to_string())
    }

    /// Shorthand for a [`Self::DeadlineExceeded`] built from a `Display`.
    #[must_use]
    pub fn deadline_exceeded(msg: impl std::fmt::Display) -> Self {
        Self::DeadlineExceeded(msg.to_string())
    }

    /// True if the driver should roll back in-flight side effects rather
    /// than leaving partial state behind.
    #[must_use]
    pub const fn triggers_publish_rollback(&self) -> bool {
        !matches!(self, Self::AlreadyMounted(_))
    }
}

impl From<CsiError> for tonic::Status {
    fn from(err: CsiError) -> Self {
        match err {
            CsiError::InvalidArgument(msg) => Self::invalid_argument(msg),
            CsiError::MalformedContext(msg) => {
                Self::failed_precondition(format!("malformed volume context: {msg}"))
            }
            CsiError::InvalidCredentials { reference, reason } => Self::failed_precondition(
                format!("credential validation failed for {reference}: {reason}"),
            ),
            CsiError::Transient(msg) => Self::unavailable(msg),
            CsiError::CorruptedMount(msg) => {
                Self::internal(format!("corrupted mount not cleaned up: {msg}"))
            }
            CsiError::AlreadyMounted(_) => Self::ok("already mounted"),
            CsiError::Internal(msg) => Self::internal(msg),
            CsiError::DeadlineExceeded(msg) => Self::deadline_exceeded(msg),
        }
    }
}
