//! The `ObjectStore` trait and its production implementation over
//! `aws-sdk-s3`.

use aws_sdk_s3::config::Credentials as S3Credentials;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::Client;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Credentials needed to talk to the object store, independent of where
/// they were resolved from (the credential provider crate owns that).
#[derive(Clone)]
pub struct StorageCredentials {
    /// Access key id.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Optional session token (STS-issued credentials).
    pub session_token: Option<String>,
    /// Region override, falling back to the adapter's default when absent.
    pub region: Option<String>,
}

impl std::fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .field("region", &self.region)
            .finish()
    }
}

/// The four operations the core needs from the backing object store.
///
/// Implemented for both the real S3 client ([`S3ObjectStore`]) and, in
/// tests, a fake in-memory backend so controller-service unit tests don't
/// need network access.
#[allow(async_fn_in_trait)]
pub trait ObjectStore: Send + Sync {
    /// Returns success if the bucket exists and is usable by the caller
    /// (treats "already exists" and "already owned by you" as success);
    /// otherwise surfaces the original error.
    async fn create_bucket(&self, bucket: &str) -> Result<()>;

    /// Returns success if the bucket does not exist; returns success with
    /// a log entry if the bucket exists but is not empty (deleting a
    /// non-empty bucket is refused to avoid data loss); otherwise
    /// surfaces error.
    async fn delete_bucket(&self, bucket: &str) -> Result<()>;

    /// Used only by credential validation as an optional liveness probe.
    async fn head_bucket(&self, bucket: &str) -> Result<()>;

    /// Used only by credential validation as an optional liveness probe.
    async fn list_buckets(&self) -> Result<Vec<String>>;
}

/// Path-style S3 client, constructed once per set of resolved credentials.
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    /// Builds a client against `endpoint` (a full URL, including scheme)
    /// using the given credentials, forcing path-style addressing since
    /// the endpoint is user-configured and may not support virtual-host
    /// bucket addressing.
    pub fn new(endpoint: &str, default_region: &str, creds: &StorageCredentials) -> Result<Self> {
        let region = creds
            .region
            .clone()
            .unwrap_or_else(|| default_region.to_string());

        let sdk_creds = S3Credentials::new(
            creds.access_key_id.clone(),
            creds.secret_access_key.clone(),
            creds.session_token.clone(),
            None,
            "mountpoint-csi-objectstore",
        );

        let config = aws_sdk_s3::Config::builder()
            .endpoint_url(endpoint)
            .region(aws_sdk_s3::config::Region::new(region))
            .credentials_provider(sdk_creds)
            .force_path_style(true)
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .build();

        Ok(Self {
            client: Client::from_conf(config),
        })
    }
}

impl ObjectStore for S3ObjectStore {
    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        match self.client.create_bucket().bucket(bucket).send().await {
            Ok(_) => {
                info!(bucket, "bucket created");
                Ok(())
            }
            Err(SdkError::ServiceError(e))
                if e.err().is_bucket_already_owned_by_you() || e.err().is_bucket_already_exists() =>
            {
                debug!(bucket, "bucket already exists, treating as success");
                Ok(())
            }
            Err(err) => Err(Error::Backend {
                bucket: bucket.to_string(),
                source: err.to_string(),
            }),
        }
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        // Pre-check: refuse to even attempt deletion of a non-empty bucket,
        // matching the contract exactly rather than relying on the SDK
        // surfacing BucketNotEmpty (which it also does, handled below as a
        // belt-and-braces fallback for the race where objects land between
        // the check and the delete).
        match self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .max_keys(1)
            .send()
            .await
        {
            Ok(listing) => {
                if !listing.contents().is_empty() {
                    warn!(bucket, "refusing to delete non-empty bucket");
                    return Ok(());
                }
            }
            Err(SdkError::ServiceError(e)) if e.raw().status().as_u16() == 404 => {
                debug!(bucket, "bucket already absent, nothing to delete");
                return Ok(());
            }
            Err(err) => {
                return Err(Error::Backend {
                    bucket: bucket.to_string(),
                    source: err.to_string(),
                })
            }
        }

        match self.client.delete_bucket().bucket(bucket).send().await {
            Ok(_) => {
                info!(bucket, "bucket deleted");
                Ok(())
            }
            Err(SdkError::ServiceError(e)) if e.raw().status().as_u16() == 404 => Ok(()),
            Err(SdkError::ServiceError(e)) if e.raw().status().as_u16() == 409 => {
                warn!(bucket, "bucket became non-empty, preserving it");
                Ok(())
            }
            Err(err) => Err(Error::Backend {
                bucket: bucket.to_string(),
                source: err.to_string(),
            }),
        }
    }

    async fn head_bucket(&self, bucket: &str) -> Result<()> {
        self.client
            .head_bucket()
            .bucket(bucket)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| Error::Backend {
                bucket: bucket.to_string(),
                source: err.to_string(),
            })
    }

    async fn list_buckets(&self) -> Result<Vec<String>> {
        let output = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|err| Error::Backend {
                bucket: String::new(),
                source: err.to_string(),
            })?;

        Ok(output
            .buckets()
            .iter()
            .filter_map(|b| b.name().map(str::to_string))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// An in-memory fake satisfying [`ObjectStore`], used by the
    /// controller-service tests in `mountpoint-csi-node` as well as the
    /// bucket-safety property test here.
    #[derive(Default)]
    pub struct FakeObjectStore {
        buckets: Mutex<HashMap<String, Vec<String>>>,
    }

    impl FakeObjectStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_bucket(self, name: &str, objects: Vec<String>) -> Self {
            self.buckets
                .lock()
                .unwrap()
                .insert(name.to_string(), objects);
            self
        }
    }

    impl ObjectStore for FakeObjectStore {
        async fn create_bucket(&self, bucket: &str) -> Result<()> {
            self.buckets
                .lock()
                .unwrap()
                .entry(bucket.to_string())
                .or_default();
            Ok(())
        }

        async fn delete_bucket(&self, bucket: &str) -> Result<()> {
            let mut buckets = self.buckets.lock().unwrap();
            match buckets.get(bucket) {
                None => Ok(()),
                Some(objects) if !objects.is_empty() => Ok(()),
                Some(_) => {
                    buckets.remove(bucket);
                    Ok(())
                }
            }
        }

        async fn head_bucket(&self, bucket: &str) -> Result<()> {
            if self.buckets.lock().unwrap().contains_key(bucket) {
                Ok(())
            } else {
                Err(Error::Backend {
                    bucket: bucket.to_string(),
                    source: "not found".to_string(),
                })
            }
        }

        async fn list_buckets(&self) -> Result<Vec<String>> {
            Ok(self.buckets.lock().unwrap().keys().cloned().collect())
        }
    }

    #[tokio::test]
    async fn create_bucket_is_idempotent() {
        let store = FakeObjectStore::new();
        store.create_bucket("vol-1").await.unwrap();
        store.create_bucket("vol-1").await.unwrap();
        assert_eq!(store.list_buckets().await.unwrap(), vec!["vol-1"]);
    }

    #[tokio::test]
    async fn delete_bucket_never_deletes_non_empty_bucket() {
        let store = FakeObjectStore::new().with_bucket("vol-1", vec!["obj.txt".to_string()]);
        store.delete_bucket("vol-1").await.unwrap();
        assert!(store.head_bucket("vol-1").await.is_ok(), "non-empty bucket must survive");
    }

    #[tokio::test]
    async fn delete_bucket_on_absent_bucket_succeeds() {
        let store = FakeObjectStore::new();
        store.delete_bucket("does-not-exist").await.unwrap();
    }

    #[tokio::test]
    async fn delete_bucket_removes_empty_bucket() {
        let store = FakeObjectStore::new().with_bucket("vol-1", vec![]);
        store.delete_bucket("vol-1").await.unwrap();
        assert!(store.head_bucket("vol-1").await.is_err());
    }
}
