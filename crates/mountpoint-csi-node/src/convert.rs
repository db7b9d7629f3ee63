//! Error conversions from every component crate's local error type into
//! the shared [`mountpoint_csi_proto::CsiError`].
//!
//! None of the component error types are defined in this crate, and
//! neither is `CsiError`, so the orphan rule rules out a blanket
//! `impl From<ComponentError> for CsiError` here; these are plain
//! functions instead.

use mountpoint_csi_proto::CsiError;

/// Converts a mount-primitive error into the shared taxonomy.
#[must_use]
pub fn mount_err(err: mountpoint_csi_mount::Error) -> CsiError {
    use mountpoint_csi_mount::Error as E;
    match err {
        E::Unsupported => CsiError::internal(err.to_string()),
        E::Syscall { .. } | E::Io { .. } => CsiError::transient(err.to_string()),
        E::ForeignMount(ref target) => CsiError::CorruptedMount(target.clone()),
    }
}

/// Converts an attachment-coordinator / mounter-workload-manager error
/// into the shared taxonomy.
#[must_use]
pub fn attach_err(err: mountpoint_csi_attach::Error) -> CsiError {
    use mountpoint_csi_attach::Error as E;
    match err {
        E::PlatformApi(_) | E::ReadinessTimeout { .. } | E::Handoff { .. } | E::ReferencesRemain { .. } => {
            CsiError::transient(err.to_string())
        }
        E::HandoffRejected { .. } => CsiError::internal(err.to_string()),
        E::MountPrimitive(inner) => mount_err(inner),
    }
}

/// Converts a credential-provider error into the shared taxonomy.
#[must_use]
pub fn creds_err(err: mountpoint_csi_creds::Error) -> CsiError {
    use mountpoint_csi_creds::Error as E;
    match err {
        E::Transient(_) => CsiError::transient(err.to_string()),
        E::InvalidCredentials { reference, reason } => CsiError::InvalidCredentials { reference, reason },
        E::MalformedContext(_) => CsiError::malformed_context(err.to_string()),
    }
}

/// Converts a volume-context-parsing or mount-option-building error
/// into the shared taxonomy.
#[must_use]
pub fn args_err(err: mountpoint_csi_args::Error) -> CsiError {
    use mountpoint_csi_args::Error as E;
    match err {
        E::MissingBucketName | E::UnrecognizedAuthenticationSource(_) | E::IncompleteSecretReference { .. } => {
            CsiError::malformed_context(err.to_string())
        }
        E::EmptyToken | E::InvalidValue { .. } => CsiError::invalid_argument(err.to_string()),
    }
}

/// Converts an object-storage adapter error into the shared taxonomy.
#[must_use]
pub fn store_err(err: mountpoint_csi_objectstore::Error) -> CsiError {
    use mountpoint_csi_objectstore::Error as E;
    match err {
        E::Backend { .. } => CsiError::transient(err.to_string()),
        E::ClientConfig(_) => CsiError::internal(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mount_syscall_errors_are_transient() {
        let err = mountpoint_csi_mount::Error::Syscall {
            operation: "mount",
            target: "/mnt".to_string(),
            source: "EPERM".to_string(),
        };
        assert!(matches!(mount_err(err), CsiError::Transient(_)));
    }

    #[test]
    fn mount_foreign_mount_is_corrupted() {
        let err = mountpoint_csi_mount::Error::ForeignMount("/mnt".to_string());
        assert!(matches!(mount_err(err), CsiError::CorruptedMount(_)));
    }

    #[test]
    fn attach_handoff_rejected_is_internal() {
        let err = mountpoint_csi_attach::Error::HandoffRejected {
            workload: "s3-mounter-abc".to_string(),
            reason: "bad request".to_string(),
        };
        assert!(matches!(attach_err(err), CsiError::Internal(_)));
    }

    #[test]
    fn attach_readiness_timeout_is_transient() {
        let err = mountpoint_csi_attach::Error::ReadinessTimeout {
            name: "s3-mounter-abc".to_string(),
            deadline_secs: 30,
        };
        assert!(matches!(attach_err(err), CsiError::Transient(_)));
    }

    #[test]
    fn creds_invalid_credentials_preserve_reference_and_reason() {
        let err = mountpoint_csi_creds::Error::InvalidCredentials {
            reference: "kube-system/s3-creds".to_string(),
            reason: "empty access key".to_string(),
        };
        match creds_err(err) {
            CsiError::InvalidCredentials { reference, reason } => {
                assert_eq!(reference, "kube-system/s3-creds");
                assert_eq!(reason, "empty access key");
            }
            other => panic!("expected InvalidCredentials, got {other:?}"),
        }
    }

    #[test]
    fn args_missing_bucket_name_is_malformed_context() {
        let err = mountpoint_csi_args::Error::MissingBucketName;
        assert!(matches!(args_err(err), CsiError::MalformedContext(_)));
    }

    #[test]
    fn args_invalid_value_is_invalid_argument() {
        let err = mountpoint_csi_args::Error::InvalidValue {
            key: "uid".to_string(),
            expected: "an integer",
            value: "not-a-number".to_string(),
        };
        assert!(matches!(args_err(err), CsiError::InvalidArgument(_)));
    }

    #[test]
    fn store_backend_error_is_transient() {
        let err = mountpoint_csi_objectstore::Error::Backend {
            bucket: "my-bucket".to_string(),
            source: "timeout".to_string(),
        };
        assert!(matches!(store_err(err), CsiError::Transient(_)));
    }
}
