//! Deterministic, non-reversible identifier for a set of resolved
//! credentials. Two distinct secrets never collide in practice, and
//! identical secrets always fingerprint equal, making this safe to use
//! as part of the mounter-workload sharing key.

use std::fmt;

use mountpoint_csi_objectstore::client::StorageCredentials;

/// A blake3 hash over a credential's key material. Never round-trips
/// back to the secret, and is safe to log.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CredentialsFingerprint([u8; 32]);

impl CredentialsFingerprint {
    /// Hashes `source` (the resolution source's identity — e.g.
    /// `driver-credentials` or a secret's `namespace/name`) together with
    /// the access key id, secret access key, and session token (region is
    /// excluded: a region change does not change which credentials are in
    /// play). Folding the source in keeps two different sources that
    /// happen to resolve to identical key material from collapsing onto
    /// the same sharing key.
    #[must_use]
    pub fn compute(source: &str, creds: &StorageCredentials) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(source.as_bytes());
        hasher.update(b"\0");
        hasher.update(creds.access_key_id.as_bytes());
        hasher.update(b"\0");
        hasher.update(creds.secret_access_key.as_bytes());
        hasher.update(b"\0");
        hasher.update(creds.session_token.as_deref().unwrap_or("").as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    /// The fingerprint as a lowercase hex string, suitable for use in a
    /// Kubernetes label value.
    #[must_use]
    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }

    /// Reconstructs a fingerprint from the hex string [`Self::to_hex`]
    /// produced, without access to the underlying credentials. Used to
    /// rebuild a sharing key from state persisted at publish time,
    /// since an unpublish call never carries credentials.
    #[must_use]
    pub fn from_hex(hex: &str) -> Option<Self> {
        let bytes = hex::decode(hex).ok()?;
        let array: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(array))
    }
}

impl fmt::Debug for CredentialsFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CredentialsFingerprint({})", self.to_hex())
    }
}

impl fmt::Display for CredentialsFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
