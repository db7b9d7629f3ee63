//! Volume-context parser.
//!
//! A pure function from the unordered key/value map delivered on every
//! publish into a typed [`VolumeContext`]. Rejects an empty `bucketName`,
//! normalizes the `authenticationSource` enum, ignores unrecognized keys,
//! and enforces that each recognized secret-reference pair is either
//! fully present or fully absent.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Which credential source the node must use for this volume, as recorded
/// in the volume context at provisioning time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthenticationSource {
    /// Use the process-wide driver credentials loaded at startup.
    Driver,
    /// Fetch a per-volume secret from the platform API.
    Secret,
}

impl AuthenticationSource {
    fn parse(raw: &str) -> Result<Self> {
        match raw {
            "driver" => Ok(Self::Driver),
            "secret" => Ok(Self::Secret),
            other => Err(Error::UnrecognizedAuthenticationSource(other.to_string())),
        }
    }
}

/// A namespace-qualified reference to a secret in the platform API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretReference {
    /// The secret's name.
    pub name: String,
    /// The namespace the secret lives in.
    pub namespace: String,
}

/// The typed record decoded from a volume context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeContext {
    /// The backing bucket name. Required, non-empty.
    pub bucket_name: String,
    /// Which credential source the node must use.
    pub authentication_source: AuthenticationSource,
    /// Informational; set by the controller for dynamically provisioned
    /// volumes.
    pub dynamic_provisioning: bool,
    /// The per-secret reference named in the context, if any.
    pub secret_reference: Option<SecretReference>,
}

const KEY_BUCKET_NAME: &str = "bucketName";
const KEY_AUTH_SOURCE: &str = "authenticationSource";
const KEY_DYNAMIC_PROVISIONING: &str = "dynamicProvisioning";
const KEY_SECRET_NAME: &str = "csi.storage.k8s.io/secret-name";
const KEY_SECRET_NAMESPACE: &str = "csi.storage.k8s.io/secret-namespace";

/// Decodes a raw volume-context map into a [`VolumeContext`].
///
/// Unrecognized keys are silently ignored.
pub fn parse_volume_context(raw: &HashMap<String, String>) -> Result<VolumeContext> {
    let bucket_name = raw
        .get(KEY_BUCKET_NAME)
        .map(String::as_str)
        .unwrap_or_default()
        .trim();
    if bucket_name.is_empty() {
        return Err(Error::MissingBucketName);
    }

    let authentication_source = match raw.get(KEY_AUTH_SOURCE) {
        Some(raw) => AuthenticationSource::parse(raw.trim())?,
        None => AuthenticationSource::Driver,
    };

    let dynamic_provisioning = raw
        .get(KEY_DYNAMIC_PROVISIONING)
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let secret_reference = parse_secret_reference(
        raw,
        KEY_SECRET_NAME,
        KEY_SECRET_NAMESPACE,
        "csi.storage.k8s.io/secret-{name,namespace}",
    )?;

    Ok(VolumeContext {
        bucket_name: bucket_name.to_string(),
        authentication_source,
        dynamic_provisioning,
        secret_reference,
    })
}

fn parse_secret_reference(
    raw: &HashMap<String, String>,
    name_key: &'static str,
    namespace_key: &'static str,
    field: &'static str,
) -> Result<Option<SecretReference>> {
    let name = raw.get(name_key).map(|s| s.trim().to_string());
    let namespace = raw.get(namespace_key).map(|s| s.trim().to_string());

    match (name, namespace) {
        (None, None) => Ok(None),
        (Some(name), Some(namespace)) if !name.is_empty() && !namespace.is_empty() => {
            Ok(Some(SecretReference { name, namespace }))
        }
        (Some(name), None) if name.is_empty() => Ok(None),
        (None, Some(namespace)) if namespace.is_empty() => Ok(None),
        _ => Err(Error::IncompleteSecretReference { field }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn rejects_empty_bucket_name() {
        let raw = ctx(&[("bucketName", "")]);
        assert_eq!(parse_volume_context(&raw), Err(Error::MissingBucketName));
    }

    #[test]
    fn rejects_missing_bucket_name() {
        let raw = ctx(&[("authenticationSource", "driver")]);
        assert_eq!(parse_volume_context(&raw), Err(Error::MissingBucketName));
    }

    #[test]
    fn defaults_to_driver_auth_when_absent() {
        let raw = ctx(&[("bucketName", "v1")]);
        let parsed = parse_volume_context(&raw).unwrap();
        assert_eq!(parsed.authentication_source, AuthenticationSource::Driver);
        assert!(!parsed.dynamic_provisioning);
        assert!(parsed.secret_reference.is_none());
    }

    #[test]
    fn parses_secret_auth_with_reference() {
        let raw = ctx(&[
            ("bucketName", "v1"),
            ("authenticationSource", "secret"),
            ("csi.storage.k8s.io/secret-name", "s3-creds"),
            ("csi.storage.k8s.io/secret-namespace", "kube-system"),
        ]);
        let parsed = parse_volume_context(&raw).unwrap();
        assert_eq!(parsed.authentication_source, AuthenticationSource::Secret);
        assert_eq!(
            parsed.secret_reference,
            Some(SecretReference {
                name: "s3-creds".to_string(),
                namespace: "kube-system".to_string(),
            })
        );
    }

    #[test]
    fn rejects_unrecognized_authentication_source() {
        let raw = ctx(&[("bucketName", "v1"), ("authenticationSource", "bogus")]);
        assert!(matches!(
            parse_volume_context(&raw),
            Err(Error::UnrecognizedAuthenticationSource(_))
        ));
    }

    #[test]
    fn rejects_half_present_secret_reference() {
        let raw = ctx(&[
            ("bucketName", "v1"),
            ("csi.storage.k8s.io/secret-name", "s3-creds"),
        ]);
        assert!(matches!(
            parse_volume_context(&raw),
            Err(Error::IncompleteSecretReference { .. })
        ));
    }

    #[test]
    fn ignores_unrecognized_keys() {
        let raw = ctx(&[("bucketName", "v1"), ("someVendorExtension", "whatever")]);
        assert!(parse_volume_context(&raw).is_ok());
    }

    #[test]
    fn dynamic_provisioning_is_case_insensitive() {
        let raw = ctx(&[("bucketName", "v1"), ("dynamicProvisioning", "TRUE")]);
        assert!(parse_volume_context(&raw).unwrap().dynamic_provisioning);
    }
}
