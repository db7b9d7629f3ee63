//! Shared types: cache keys, the resolved-credentials envelope, and
//! the process-wide driver credentials read from the environment.

use std::env;

use mountpoint_csi_objectstore::client::StorageCredentials;

use crate::error::{Error, Result};
use crate::fingerprint::CredentialsFingerprint;
use crate::source::{validate_secret, RawSecret};

/// The reference identifying which entry a cache lookup is for
/// or the
/// sentinel `driver-credentials`").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// The process-wide driver credentials.
    Driver,
    /// A platform-API secret at `namespace/name`.
    Secret {
        /// The secret's namespace.
        namespace: String,
        /// The secret's name.
        name: String,
    },
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Driver => write!(f, "driver-credentials"),
            Self::Secret { namespace, name } => write!(f, "{namespace}/{name}"),
        }
    }
}

/// A fully resolved, validated credential set plus its fingerprint.
#[derive(Clone)]
pub struct ResolvedCredentials {
    /// The credentials, ready to hand to an `ObjectStore` client.
    pub storage: StorageCredentials,
    /// Fingerprint of `storage`, used as part of the mounter sharing key.
    pub fingerprint: CredentialsFingerprint,
}

impl ResolvedCredentials {
    fn from_validated(reference: &str, access_key_id: String, secret_access_key: String, raw: &RawSecret) -> Self {
        let storage = StorageCredentials {
            access_key_id,
            secret_access_key,
            session_token: raw.session_token.clone(),
            region: raw.region.clone(),
        };
        let fingerprint = CredentialsFingerprint::compute(reference, &storage);
        Self { storage, fingerprint }
    }

    /// Validates `raw` under `reference` and wraps it. `reference` (the
    /// source's identity — `driver-credentials`, `request-secret`, or a
    /// secret's `namespace/name`) is folded into the fingerprint so that
    /// two different sources resolving to identical key material never
    /// share a sharing key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCredentials`] if validation fails.
    pub fn validate(reference: &str, raw: &RawSecret) -> Result<Self> {
        let (access_key_id, secret_access_key) = validate_secret(reference, raw)?;
        Ok(Self::from_validated(reference, access_key_id, secret_access_key, raw))
    }
}

/// Environment variable names the driver process reads its own
/// fallback credentials from at startup.
pub const ENV_DRIVER_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
/// See [`ENV_DRIVER_ACCESS_KEY_ID`].
pub const ENV_DRIVER_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
/// See [`ENV_DRIVER_ACCESS_KEY_ID`].
pub const ENV_DRIVER_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";
/// See [`ENV_DRIVER_ACCESS_KEY_ID`].
pub const ENV_DRIVER_REGION: &str = "AWS_REGION";

/// Reads the process-wide driver credentials from the environment.
/// Validation is deferred to the caller (the provider validates once,
/// the same way it validates any other secret).
#[must_use]
pub fn driver_credentials_from_env() -> RawSecret {
    RawSecret {
        access_key_id: env::var(ENV_DRIVER_ACCESS_KEY_ID).ok(),
        secret_access_key: env::var(ENV_DRIVER_SECRET_ACCESS_KEY).ok(),
        session_token: env::var(ENV_DRIVER_SESSION_TOKEN).ok(),
        region: env::var(ENV_DRIVER_REGION).ok(),
    }
}

/// Used when a secret reference names a namespace without a name or
/// vice versa — defense in depth; `mountpoint_csi_args` already
/// enforces both-or-neither at parse time.
pub fn require_secret_reference(namespace: Option<&str>, name: Option<&str>) -> Result<(String, String)> {
    match (namespace, name) {
        (Some(ns), Some(n)) if !ns.is_empty() && !n.is_empty() => Ok((ns.to_string(), n.to_string())),
        _ => Err(Error::MalformedContext(
            "secret reference requires both namespace and name".to_string(),
        )),
    }
}
