//! Credential provider (component D): multi-source resolution,
//! validation, blake3 fingerprinting, and an expirable LRU cache.

#![warn(missing_docs)]

pub mod cache;
pub mod error;
pub mod fingerprint;
pub mod provider;
pub mod source;
pub mod types;

pub use error::{Error, Result};
pub use fingerprint::CredentialsFingerprint;
pub use provider::{CredentialProvider, Operation};
pub use source::{validate_secret, RawSecret, SecretSource};
pub use types::{
    driver_credentials_from_env, CacheKey, ResolvedCredentials, ENV_DRIVER_ACCESS_KEY_ID,
    ENV_DRIVER_REGION, ENV_DRIVER_SECRET_ACCESS_KEY, ENV_DRIVER_SESSION_TOKEN,
};
