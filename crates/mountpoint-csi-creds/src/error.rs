//! Error types for credential resolution.

use thiserror::Error;

/// Result type alias for credential-provider operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors the credential provider can report.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Fetching a secret from the platform API failed.
    #[error("fetching credentials failed: {0}")]
    Transient(String),

    /// A fetched secret failed validation, or the driver-wide fallback is
    /// incomplete. Never cached.
    #[error("invalid credentials for {reference}: {reason}")]
    InvalidCredentials {
        /// The `namespace/name` the secret came from, or `driver-credentials`.
        reference: String,
        /// Why validation failed.
        reason: String,
    },

    /// The volume context names a secret but is missing the namespace or
    /// the name.
    #[error("malformed secret reference: {0}")]
    MalformedContext(String),
}
