//! In-memory fakes for the node plugin's collaborator traits.
//!
//! Not `#[cfg(test)]`-gated so both this crate's unit tests and the
//! scenario tests under `tests/` can build a [`crate::node::NodeService`]
//! or [`crate::controller::ControllerService`] without a cluster, a
//! kernel mount namespace, or a real S3 endpoint.

use std::collections::HashMap;
use std::os::fd::OwnedFd;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mountpoint_csi_args::MountOptions;
use mountpoint_csi_attach::{
    AttachmentCoordinator, AttachmentHandle, AttachmentKey, ConsumerRef, Error as AttachError, HandoffRequest,
    MounterWorkloadManager, ReleaseOutcome, WorkloadPhase,
};
use mountpoint_csi_creds::{RawSecret, Result as CredsResult, SecretSource};
use mountpoint_csi_mount::{MountCall, MountPrimitives, MountState, Result as MountResult};
use mountpoint_csi_objectstore::{Error as StoreError, ObjectStore, Result as StoreResult, StorageCredentials};

use crate::controller::ObjectStoreFactory;

/// An [`AttachmentCoordinator`] backed by an in-process map rather than
/// the cluster API.
#[derive(Default)]
pub struct FakeCoordinator {
    records: Mutex<HashMap<String, (Vec<String>, WorkloadPhase)>>,
}

impl AttachmentCoordinator for FakeCoordinator {
    async fn resolve(&self, key: &AttachmentKey, consumer: &ConsumerRef) -> mountpoint_csi_attach::Result<AttachmentHandle> {
        let name = key.resource_name();
        let mut records = self.records.lock().unwrap();
        let created = !records.contains_key(&name);
        let entry = records.entry(name.clone()).or_insert_with(|| (Vec::new(), WorkloadPhase::Pending));
        if !entry.0.contains(&consumer.uid) {
            entry.0.push(consumer.uid.clone());
        }
        Ok(AttachmentHandle {
            key: key.clone(),
            name,
            namespace: "default".to_string(),
            phase: entry.1,
            created,
        })
    }

    async fn release(&self, key: &AttachmentKey, consumer: &ConsumerRef) -> mountpoint_csi_attach::Result<ReleaseOutcome> {
        let name = key.resource_name();
        let mut records = self.records.lock().unwrap();
        let Some(entry) = records.get_mut(&name) else {
            return Ok(ReleaseOutcome::Retired);
        };
        entry.0.retain(|uid| uid != &consumer.uid);
        if entry.0.is_empty() {
            records.remove(&name);
            Ok(ReleaseOutcome::Retired)
        } else {
            Ok(ReleaseOutcome::StillReferenced)
        }
    }

    async fn mark_failed(&self, key: &AttachmentKey) -> mountpoint_csi_attach::Result<()> {
        self.set_phase(key, WorkloadPhase::Failed).await
    }

    async fn set_phase(&self, key: &AttachmentKey, phase: WorkloadPhase) -> mountpoint_csi_attach::Result<()> {
        if let Some(entry) = self.records.lock().unwrap().get_mut(&key.resource_name()) {
            entry.1 = phase;
        }
        Ok(())
    }
}

impl FakeCoordinator {
    /// Number of distinct sharing keys this coordinator currently tracks
    /// a mounter workload for.
    pub fn live_workload_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

/// A [`MounterWorkloadManager`] that counts handoffs instead of passing
/// a real `/dev/fuse` fd to a sidecar Pod.
#[derive(Default)]
pub struct FakeWorkload {
    handoffs: Mutex<u32>,
    retires: Mutex<u32>,
    last_request: Mutex<Option<HandoffRequest>>,
    /// When set, [`MounterWorkloadManager::handoff`] fails every call —
    /// used to exercise the "deadline exceeded, no workload left
    /// dangling" boundary behavior.
    pub fail_handoff: bool,
    /// When set, [`MounterWorkloadManager::ensure_running`] sleeps this
    /// long before returning — used to force a publish past its overall
    /// deadline without a real, slow-to-ready mounter workload.
    ensure_running_delay: Option<Duration>,
}

impl FakeWorkload {
    /// Number of successful handoffs performed so far.
    pub fn handoff_count(&self) -> u32 {
        *self.handoffs.lock().unwrap()
    }

    /// Number of workloads retired so far.
    pub fn retire_count(&self) -> u32 {
        *self.retires.lock().unwrap()
    }

    /// The most recent [`HandoffRequest`] this fake accepted, if any.
    pub fn last_request(&self) -> Option<HandoffRequest> {
        self.last_request.lock().unwrap().clone()
    }

    /// Builder: makes `ensure_running` sleep `delay` before reporting
    /// ready.
    #[must_use]
    pub fn with_ensure_running_delay(mut self, delay: Duration) -> Self {
        self.ensure_running_delay = Some(delay);
        self
    }
}

impl MounterWorkloadManager for FakeWorkload {
    async fn ensure_running(&self, _handle: &AttachmentHandle, _deadline: Duration) -> mountpoint_csi_attach::Result<()> {
        if let Some(delay) = self.ensure_running_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn handoff(&self, handle: &AttachmentHandle, request: HandoffRequest) -> mountpoint_csi_attach::Result<()> {
        if self.fail_handoff {
            return Err(AttachError::Handoff {
                workload: handle.name.clone(),
                reason: "simulated failure".to_string(),
            });
        }
        *self.handoffs.lock().unwrap() += 1;
        *self.last_request.lock().unwrap() = Some(request);
        Ok(())
    }

    async fn retire(&self, _handle: &AttachmentHandle) -> mountpoint_csi_attach::Result<()> {
        *self.retires.lock().unwrap() += 1;
        Ok(())
    }

    fn mount_source_path(&self, handle: &AttachmentHandle) -> PathBuf {
        PathBuf::from("/var/lib/kubelet/mountpoint-s3-csi/mounts").join(&handle.name)
    }
}

/// A [`MountPrimitives`] that tracks bind-mounts in memory; never
/// touches `/proc/mounts` or opens `/dev/fuse`.
#[derive(Default)]
pub struct FakeMount {
    mounted: Mutex<HashMap<PathBuf, PathBuf>>,
}

impl FakeMount {
    /// Whether `target` is currently recorded as bind-mounted.
    pub fn is_mounted(&self, target: &Path) -> bool {
        self.mounted.lock().unwrap().contains_key(target)
    }
}

impl MountPrimitives for FakeMount {
    fn check_mountpoint(&self, target: &Path) -> MountResult<MountState> {
        Ok(if self.mounted.lock().unwrap().contains_key(target) {
            MountState::MountedByDriver
        } else {
            MountState::NotMounted
        })
    }

    fn is_corrupted(&self, _target: &Path) -> MountResult<bool> {
        Ok(false)
    }

    fn unmount(&self, target: &Path) -> MountResult<()> {
        self.mounted.lock().unwrap().remove(target);
        Ok(())
    }

    fn find_references_to_mountpoint(&self, _source: &Path) -> MountResult<Vec<PathBuf>> {
        Ok(Vec::new())
    }

    fn open_fuse_device(&self) -> MountResult<OwnedFd> {
        Err(mountpoint_csi_mount::Error::Unsupported)
    }

    fn create_mount_call(&self, _fd: &OwnedFd, _target: &Path, _options: &MountOptions) -> MountResult<MountCall> {
        Err(mountpoint_csi_mount::Error::Unsupported)
    }

    fn perform_mount(&self, _target: &Path, _call: &MountCall) -> MountResult<()> {
        Ok(())
    }

    fn bind_mount(&self, source: &Path, target: &Path) -> MountResult<()> {
        self.mounted.lock().unwrap().insert(target.to_path_buf(), source.to_path_buf());
        Ok(())
    }
}

/// A [`SecretSource`] that always resolves to a fixed secret, as if
/// `namespace/name` names a `Secret` the fake cluster already has.
pub struct FakeSecretSource {
    access_key_id: String,
    secret_access_key: String,
    region: Option<String>,
}

impl Default for FakeSecretSource {
    fn default() -> Self {
        Self {
            access_key_id: "AK".to_string(),
            secret_access_key: "SK".to_string(),
            region: None,
        }
    }
}

impl FakeSecretSource {
    /// Builds a fake that resolves to the given access key id, secret
    /// access key, and optional region regardless of which secret is
    /// requested — used to simulate credential rotation by swapping one
    /// instance for another between publishes.
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>, region: Option<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            region,
        }
    }
}

impl SecretSource for FakeSecretSource {
    async fn fetch_secret(&self, _namespace: &str, _name: &str) -> CredsResult<RawSecret> {
        Ok(RawSecret {
            access_key_id: Some(self.access_key_id.clone()),
            secret_access_key: Some(self.secret_access_key.clone()),
            session_token: None,
            region: self.region.clone(),
        })
    }
}

/// An [`ObjectStore`] backed by an in-process bucket map; `DeleteBucket`
/// on a bucket holding objects is a no-op, matching the real S3 adapter's
/// non-empty-bucket rule.
#[derive(Default)]
pub struct FakeStore {
    buckets: Mutex<HashMap<String, Vec<String>>>,
}

impl FakeStore {
    /// Seeds `bucket` as already existing and holding `objects`, as if
    /// workloads had already written data into it.
    pub fn seed(&self, bucket: &str, objects: Vec<String>) {
        self.buckets.lock().unwrap().insert(bucket.to_string(), objects);
    }

    /// Whether `bucket` still exists.
    pub fn bucket_exists(&self, bucket: &str) -> bool {
        self.buckets.lock().unwrap().contains_key(bucket)
    }
}

impl ObjectStore for FakeStore {
    async fn create_bucket(&self, bucket: &str) -> StoreResult<()> {
        self.buckets.lock().unwrap().entry(bucket.to_string()).or_default();
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> StoreResult<()> {
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

    async fn head_bucket(&self, bucket: &str) -> StoreResult<()> {
        if self.buckets.lock().unwrap().contains_key(bucket) {
            Ok(())
        } else {
            Err(StoreError::Backend { bucket: bucket.to_string(), source: "not found".to_string() })
        }
    }

    async fn list_buckets(&self) -> StoreResult<Vec<String>> {
        Ok(self.buckets.lock().unwrap().keys().cloned().collect())
    }
}

/// An [`ObjectStoreFactory`] handing out clones of one shared
/// [`FakeStore`] regardless of which credentials were resolved, so a
/// scenario test can assert on the same backend a `CreateVolume` and a
/// later `DeleteVolume` both touched.
#[derive(Clone, Default)]
pub struct SharedFakeFactory {
    store: Arc<FakeStore>,
    last_access_key_id: Arc<Mutex<Option<String>>>,
}

impl SharedFakeFactory {
    /// The backing store every build shares.
    pub fn store(&self) -> Arc<FakeStore> {
        self.store.clone()
    }

    /// Access key id used on the most recent `build` call, if any.
    pub fn last_access_key_id(&self) -> Option<String> {
        self.last_access_key_id.lock().unwrap().clone()
    }
}

impl ObjectStoreFactory for SharedFakeFactory {
    type Store = Arc<FakeStore>;

    fn build(&self, credentials: &StorageCredentials) -> StoreResult<Self::Store> {
        *self.last_access_key_id.lock().unwrap() = Some(credentials.access_key_id.clone());
        Ok(self.store.clone())
    }
}

impl ObjectStore for Arc<FakeStore> {
    async fn create_bucket(&self, bucket: &str) -> StoreResult<()> {
        (**self).create_bucket(bucket).await
    }

    async fn delete_bucket(&self, bucket: &str) -> StoreResult<()> {
        (**self).delete_bucket(bucket).await
    }

    async fn head_bucket(&self, bucket: &str) -> StoreResult<()> {
        (**self).head_bucket(bucket).await
    }

    async fn list_buckets(&self) -> StoreResult<Vec<String>> {
        (**self).list_buckets().await
    }
}
