//! The sharing key:
//! `(volume-id, node, credentials-fingerprint, fs-group)`. Equal keys
//! share exactly one mounter workload.

use mountpoint_csi_creds::CredentialsFingerprint;

/// Identifies which mounter workload a publish should use.
///
/// Two publishes with an equal key share the same workload and
/// therefore the same mount; any differing field forces a separate
/// workload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttachmentKey {
    /// The volume being published.
    pub volume_id: String,
    /// The node the publish is happening on.
    pub node: String,
    /// Fingerprint of the resolved credentials.
    pub fingerprint: CredentialsFingerprint,
    /// The caller-supplied fsGroup, if any. `None` and `Some("0")` are
    /// distinct keys: presence/absence matters, not a numeric default.
    pub fs_group: Option<String>,
}

impl AttachmentKey {
    /// A stable, DNS-1123-label-safe name derived from the key,
    /// suitable for naming both the attachment record and its mounter
    /// workload. Deterministic: the same key always renders the same
    /// name, which is what makes the coordinator's create-if-absent
    /// primitive meaningful.
    #[must_use]
    pub fn resource_name(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.volume_id.as_bytes());
        hasher.update(b"\0");
        hasher.update(self.node.as_bytes());
        hasher.update(b"\0");
        hasher.update(self.fingerprint.to_hex().as_bytes());
        hasher.update(b"\0");
        hasher.update(self.fs_group.as_deref().unwrap_or("").as_bytes());
        let digest = hasher.finalize();
        format!("s3-mounter-{}", &digest.to_hex()[..16])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(seed: &str) -> CredentialsFingerprint {
        CredentialsFingerprint::compute(
            "driver-credentials",
            &mountpoint_csi_objectstore::StorageCredentials {
                access_key_id: seed.to_string(),
                secret_access_key: format!("{seed}-secret"),
                session_token: None,
                region: None,
            },
        )
    }

    #[test]
    fn identical_keys_render_identical_names() {
        let a = AttachmentKey {
            volume_id: "v1".to_string(),
            node: "node-a".to_string(),
            fingerprint: fp("AK"),
            fs_group: Some("2000".to_string()),
        };
        let b = a.clone();
        assert_eq!(a.resource_name(), b.resource_name());
        assert_eq!(a, b);
    }

    #[test]
    fn differing_fs_group_forces_separate_key() {
        let base = AttachmentKey {
            volume_id: "v1".to_string(),
            node: "node-a".to_string(),
            fingerprint: fp("AK"),
            fs_group: Some("2000".to_string()),
        };
        let mut other = base.clone();
        other.fs_group = Some("3000".to_string());
        assert_ne!(base, other);
        assert_ne!(base.resource_name(), other.resource_name());
    }

    #[test]
    fn differing_fingerprint_forces_separate_key() {
        let base = AttachmentKey {
            volume_id: "v1".to_string(),
            node: "node-a".to_string(),
            fingerprint: fp("AK"),
            fs_group: None,
        };
        let mut other = base.clone();
        other.fingerprint = fp("OTHER_AK");
        assert_ne!(base, other);
    }

    #[test]
    fn resource_name_is_dns_label_safe() {
        let key = AttachmentKey {
            volume_id: "v1".to_string(),
            node: "node-a".to_string(),
            fingerprint: fp("AK"),
            fs_group: None,
        };
        let name = key.resource_name();
        assert!(name.len() <= 63);
        assert!(name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
    }
}
