//! Entry points for resolving credentials: node publish, controller
//! create/delete, and a generic dispatcher over both.

use std::time::Duration;

use mountpoint_csi_args::{AuthenticationSource, VolumeContext};
use tracing::debug;

use crate::cache::{TtlLruCache, DEFAULT_CAPACITY, DEFAULT_TTL};
use crate::error::{Error, Result};
use crate::source::{RawSecret, SecretSource};
use crate::types::{require_secret_reference, CacheKey, ResolvedCredentials};

/// Which plane a credential resolution is for; the generic dispatcher
/// uses this to pick the right resolution path.
pub enum Operation<'a> {
    /// Node publish: resolve per the volume context's authentication
    /// source, falling back to the driver-wide credentials.
    NodePublish(&'a VolumeContext),
    /// Controller create/delete: resolve per-request secrets, falling
    /// back to a provisioner secret reference, falling back to the
    /// driver-wide credentials.
    ControllerVolume {
        /// Secrets attached directly to the RPC request, if any.
        request_secret: Option<RawSecret>,
        /// The storage class's provisioner secret reference, if any.
        provisioner_secret_ref: Option<(String, String)>,
    },
}

/// Resolves, validates, caches, and fingerprints credentials for both
/// the controller and node planes.
pub struct CredentialProvider<S> {
    source: S,
    cache: TtlLruCache<CacheKey, ResolvedCredentialsRecord>,
    driver: RawSecret,
}

/// The cache stores the validated, pre-fingerprinted record; cloning it
/// out on a hit is what "cache hits return the exact same materialized
/// record" means in practice.
#[derive(Clone)]
struct ResolvedCredentialsRecord(ResolvedCredentials);

impl<S: SecretSource> CredentialProvider<S> {
    /// Builds a provider with the default cache size and TTL.
    #[must_use]
    pub fn new(source: S, driver: RawSecret) -> Self {
        Self::with_cache_settings(source, driver, DEFAULT_CAPACITY, DEFAULT_TTL)
    }

    /// Builds a provider with explicit cache settings (used by tests
    /// exercising property 6 with a shortened TTL).
    #[must_use]
    pub fn with_cache_settings(source: S, driver: RawSecret, capacity: usize, ttl: Duration) -> Self {
        Self {
            source,
            cache: TtlLruCache::new(capacity, ttl),
            driver,
        }
    }

    /// Rebuilds the cache atomically with a new TTL.
    pub async fn set_cache_ttl(&self, ttl: Duration) {
        self.cache.set_ttl(ttl).await;
    }

    /// Resolves credentials for the given [`Operation`].
    pub async fn resolve(&self, operation: Operation<'_>) -> Result<ResolvedCredentials> {
        match operation {
            Operation::NodePublish(context) => self.resolve_for_node_publish(context).await,
            Operation::ControllerVolume {
                request_secret,
                provisioner_secret_ref,
            } => {
                self.resolve_for_controller(request_secret, provisioner_secret_ref)
                    .await
            }
        }
    }

    /// Resolution order:
    /// 1. `authenticationSource=secret` with a secret reference → fetch
    ///    from the platform API.
    /// 2. Otherwise, the process-wide driver credentials.
    pub async fn resolve_for_node_publish(&self, context: &VolumeContext) -> Result<ResolvedCredentials> {
        if context.authentication_source == AuthenticationSource::Secret {
            let secret_ref = context.secret_reference.as_ref().ok_or_else(|| {
                Error::MalformedContext(
                    "authenticationSource=secret requires a secret reference".to_string(),
                )
            })?;
            let (namespace, name) = require_secret_reference(Some(&secret_ref.namespace), Some(&secret_ref.name))?;
            return self.resolve_secret(namespace, name).await;
        }
        self.resolve_driver().await
    }

    /// Resolution order: request-level secrets, then the
    /// provisioner secret reference, then the driver-wide credentials.
    pub async fn resolve_for_controller(
        &self,
        request_secret: Option<RawSecret>,
        provisioner_secret_ref: Option<(String, String)>,
    ) -> Result<ResolvedCredentials> {
        if let Some(raw) = request_secret {
            debug!("using request-level secret for controller operation");
            return Ok(ResolvedCredentials::validate("request-secret", &raw)?);
        }
        if let Some((namespace, name)) = provisioner_secret_ref {
            return self.resolve_secret(namespace, name).await;
        }
        self.resolve_driver().await
    }

    async fn resolve_secret(&self, namespace: String, name: String) -> Result<ResolvedCredentials> {
        let key = CacheKey::Secret {
            namespace: namespace.clone(),
            name: name.clone(),
        };
        let reference = key.to_string();
        let record = self
            .cache
            .get_or_insert_with(key, || async {
                let raw = self.source.fetch_secret(&namespace, &name).await?;
                ResolvedCredentials::validate(&reference, &raw).map(ResolvedCredentialsRecord)
            })
            .await?;
        Ok(record.0)
    }

    async fn resolve_driver(&self) -> Result<ResolvedCredentials> {
        let record = self
            .cache
            .get_or_insert_with(CacheKey::Driver, || async {
                ResolvedCredentials::validate("driver-credentials", &self.driver).map(ResolvedCredentialsRecord)
            })
            .await?;
        Ok(record.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use mountpoint_csi_args::SecretReference;

    /// A fake platform API whose returned secret can be mutated mid-test,
    /// used to exercise property 6 ("invalidating a secret ... restores
    /// a correct value" after TTL).
    struct FakeSecretSource {
        secret: Mutex<RawSecret>,
        fetch_count: AtomicU32,
    }

    impl FakeSecretSource {
        fn new(secret: RawSecret) -> Self {
            Self {
                secret: Mutex::new(secret),
                fetch_count: AtomicU32::new(0),
            }
        }

        fn set(&self, secret: RawSecret) {
            *self.secret.lock().unwrap() = secret;
        }

        fn fetches(&self) -> u32 {
            self.fetch_count.load(Ordering::SeqCst)
        }
    }

    impl SecretSource for FakeSecretSource {
        async fn fetch_secret(&self, _namespace: &str, _name: &str) -> Result<RawSecret> {
            self.fetch_count.fetch_add(1, Ordering::SeqCst);
            Ok(self.secret.lock().unwrap().clone())
        }
    }

    fn valid_secret(ak: &str, sk: &str) -> RawSecret {
        RawSecret {
            access_key_id: Some(ak.to_string()),
            secret_access_key: Some(sk.to_string()),
            session_token: None,
            region: None,
        }
    }

    fn context_with_secret(namespace: &str, name: &str) -> VolumeContext {
        VolumeContext {
            bucket_name: "bucket".to_string(),
            authentication_source: AuthenticationSource::Secret,
            dynamic_provisioning: false,
            secret_reference: Some(SecretReference {
                namespace: namespace.to_string(),
                name: name.to_string(),
            }),
        }
    }

    #[tokio::test]
    async fn driver_fallback_used_when_context_has_no_secret() {
        let source = FakeSecretSource::new(valid_secret("ignored", "ignored"));
        let provider = CredentialProvider::new(source, valid_secret("DRIVER_AK", "DRIVER_SK"));

        let context = VolumeContext {
            bucket_name: "bucket".to_string(),
            authentication_source: AuthenticationSource::Driver,
            dynamic_provisioning: false,
            secret_reference: None,
        };
        let resolved = provider.resolve_for_node_publish(&context).await.unwrap();
        assert_eq!(resolved.storage.access_key_id, "DRIVER_AK");
    }

    #[tokio::test]
    async fn secret_reference_is_fetched_and_validated() {
        let source = FakeSecretSource::new(valid_secret("SECRET_AK", "SECRET_SK"));
        let provider = CredentialProvider::new(source, valid_secret("DRIVER_AK", "DRIVER_SK"));

        let context = context_with_secret("ns", "name");
        let resolved = provider.resolve_for_node_publish(&context).await.unwrap();
        assert_eq!(resolved.storage.access_key_id, "SECRET_AK");
    }

    #[tokio::test]
    async fn invalid_secret_is_never_cached() {
        let source = FakeSecretSource::new(RawSecret::default());
        let provider = CredentialProvider::new(source, valid_secret("DRIVER_AK", "DRIVER_SK"));

        let context = context_with_secret("ns", "name");
        assert!(provider.resolve_for_node_publish(&context).await.is_err());
        assert!(provider.resolve_for_node_publish(&context).await.is_err());
    }

    #[tokio::test]
    async fn request_level_secret_takes_precedence_over_provisioner_secret() {
        let source = FakeSecretSource::new(valid_secret("PROVISIONER_AK", "PROVISIONER_SK"));
        let provider = CredentialProvider::new(source, valid_secret("DRIVER_AK", "DRIVER_SK"));

        let resolved = provider
            .resolve_for_controller(
                Some(valid_secret("REQUEST_AK", "REQUEST_SK")),
                Some(("ns".to_string(), "name".to_string())),
            )
            .await
            .unwrap();
        assert_eq!(resolved.storage.access_key_id, "REQUEST_AK");
    }

    #[tokio::test]
    async fn rotation_is_observed_after_ttl_elapses() {
        // Property 6: "invalidating a secret in the platform API and
        // waiting past TTL + one fetch restores a correct value."
        let source = FakeSecretSource::new(valid_secret("OLD_AK", "OLD_SK"));
        let provider = CredentialProvider::with_cache_settings(
            source,
            valid_secret("DRIVER_AK", "DRIVER_SK"),
            16,
            Duration::from_millis(20),
        );

        let context = context_with_secret("ns", "name");
        let first = provider.resolve_for_node_publish(&context).await.unwrap();
        assert_eq!(first.storage.access_key_id, "OLD_AK");

        provider.source.set(valid_secret("NEW_AK", "NEW_SK"));
        tokio::time::sleep(Duration::from_millis(40)).await;

        let rotated = provider.resolve_for_node_publish(&context).await.unwrap();
        assert_eq!(rotated.storage.access_key_id, "NEW_AK");
        assert_ne!(first.fingerprint, rotated.fingerprint);
        assert!(provider.source.fetches() >= 2);
    }

    #[tokio::test]
    async fn missing_secret_reference_with_secret_auth_source_is_malformed() {
        let source = FakeSecretSource::new(valid_secret("AK", "SK"));
        let provider = CredentialProvider::new(source, valid_secret("DRIVER_AK", "DRIVER_SK"));

        let context = VolumeContext {
            bucket_name: "bucket".to_string(),
            authentication_source: AuthenticationSource::Secret,
            dynamic_provisioning: false,
            secret_reference: None,
        };
        let err = provider.resolve_for_node_publish(&context).await.unwrap_err();
        assert!(matches!(err, Error::MalformedContext(_)));
    }
}
