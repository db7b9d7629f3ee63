//! The platform-API boundary the credential provider fetches secrets
//! through. Kept as a narrow trait so unit tests can substitute a fake
//! that can be mutated mid-test.

use crate::error::{Error, Result};

/// An unvalidated secret as read off the platform API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSecret {
    /// Access key id field, if present.
    pub access_key_id: Option<String>,
    /// Secret access key field, if present.
    pub secret_access_key: Option<String>,
    /// Optional session token.
    pub session_token: Option<String>,
    /// Optional region override.
    pub region: Option<String>,
}

/// Fetches secrets by `(namespace, name)` from the platform API.
#[allow(async_fn_in_trait)]
pub trait SecretSource: Send + Sync {
    /// Fetches the secret named `name` in `namespace`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transient`] if the platform API could not be
    /// reached or the secret does not exist.
    async fn fetch_secret(&self, namespace: &str, name: &str) -> Result<RawSecret>;
}

/// Validates a raw secret: `access_key_id` and `secret_access_key`
/// must be non-empty; `session_token`/`region` are optional.
pub fn validate_secret(reference: &str, raw: &RawSecret) -> Result<(String, String)> {
    let access_key_id = raw
        .access_key_id
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::InvalidCredentials {
            reference: reference.to_string(),
            reason: "missing or empty access_key_id".to_string(),
        })?;
    let secret_access_key = raw
        .secret_access_key
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::InvalidCredentials {
            reference: reference.to_string(),
            reason: "missing or empty secret_access_key".to_string(),
        })?;
    Ok((access_key_id.to_string(), secret_access_key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_secret_rejects_missing_access_key() {
        let raw = RawSecret {
            secret_access_key: Some("sk".to_string()),
            ..Default::default()
        };
        let err = validate_secret("ns/name", &raw).unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials { .. }));
    }

    #[test]
    fn validate_secret_rejects_empty_secret_key() {
        let raw = RawSecret {
            access_key_id: Some("ak".to_string()),
            secret_access_key: Some(String::new()),
            ..Default::default()
        };
        assert!(validate_secret("ns/name", &raw).is_err());
    }

    #[test]
    fn validate_secret_accepts_minimal_pair() {
        let raw = RawSecret {
            access_key_id: Some("ak".to_string()),
            secret_access_key: Some("sk".to_string()),
            ..Default::default()
        };
        let (ak, sk) = validate_secret("ns/name", &raw).unwrap();
        assert_eq!(ak, "ak");
        assert_eq!(sk, "sk");
    }
}
