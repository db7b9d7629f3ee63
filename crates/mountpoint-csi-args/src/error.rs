//! Error types for volume-context parsing and mount-option building.

use thiserror::Error;

/// Result type alias for this crate's operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while parsing a volume context or building mount options.
///
/// Every variant here is an `invalid-argument`/`malformed-context` error in
/// the shared taxonomy; the caller (`mountpoint-csi-node`)
/// converts it at the gRPC boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// `bucketName` was missing or empty.
    #[error("volume context is missing required key bucketName")]
    MissingBucketName,

    /// `authenticationSource` was present but not `driver` or `secret`.
    #[error("unrecognized authenticationSource {0:?}, expected \"driver\" or \"secret\"")]
    UnrecognizedAuthenticationSource(String),

    /// A secret-reference pair had a name without a namespace, or vice
    /// versa.
    #[error("secret reference {field} has a name without a namespace, or a namespace without a name")]
    IncompleteSecretReference {
        /// Which context key pair was incomplete.
        field: &'static str,
    },

    /// A mount-option token could not be split into a key (e.g. an empty
    /// string after trimming).
    #[error("empty mount option token")]
    EmptyToken,

    /// A known, typed mount-option key had a value that failed to parse
    /// as its expected type.
    #[error("mount option {key} expects a {expected} value, got {value:?}")]
    InvalidValue {
        /// The option key.
        key: String,
        /// The type it should have parsed as.
        expected: &'static str,
        /// The value that failed to parse.
        value: String,
    },
}
