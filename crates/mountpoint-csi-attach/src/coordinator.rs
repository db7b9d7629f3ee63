//! Attachment coordinator: the only component that writes
//! cluster-scoped state. Answers "given this
//! publish, which mounter workload should we use, and should we create
//! a new one?"

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::{Client, Resource, ResourceExt};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::key::AttachmentKey;
use crate::record::{
    consumer_owner_reference, ConsumerRef, MounterAttachment, MounterAttachmentSpec,
    MounterAttachmentStatus, WorkloadPhase,
};

/// What [`AttachmentCoordinator::resolve`] found or created.
#[derive(Debug, Clone)]
pub struct AttachmentHandle {
    /// The sharing key this handle was resolved for.
    pub key: AttachmentKey,
    /// The attachment record's name (also the mounter workload's
    /// name; one name serves both).
    pub name: String,
    /// The namespace the record and workload live in.
    pub namespace: String,
    /// The workload's last-observed phase.
    pub phase: WorkloadPhase,
    /// True if this call created the record (and therefore the
    /// workload) — the node service uses this to decide whether a
    /// rollback should delete the workload.
    pub created: bool,
}

/// The outcome of dropping a consumer reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Other consumers still reference this attachment; the workload
    /// keeps running.
    StillReferenced,
    /// This was the last consumer reference; the record (and
    /// therefore the workload) was deleted.
    Retired,
}

/// Resolves sharing keys to mounter workloads and manages the
/// cluster-scoped attachment record's lifecycle.
#[allow(async_fn_in_trait)]
pub trait AttachmentCoordinator: Send + Sync {
    /// Locates the attachment record for `key`, creating it (with
    /// `consumer` as its sole owner reference) if absent. A publish
    /// that finds the key already present returns the existing handle
    /// without side effects; a publish
    /// that finds a `Failed` workload leaves `phase = Failed` in the
    /// returned handle so the caller (the workload manager) knows to
    /// recreate it in place.
    async fn resolve(&self, key: &AttachmentKey, consumer: &ConsumerRef) -> Result<AttachmentHandle>;

    /// Drops `consumer`'s reference to the attachment record for
    /// `key`. If no reference was ever added (e.g. a retry after a
    /// prior unpublish already removed it), this is a no-op that
    /// returns [`ReleaseOutcome::Retired`].
    async fn release(&self, key: &AttachmentKey, consumer: &ConsumerRef) -> Result<ReleaseOutcome>;

    /// Marks the attachment record's workload as failed, so the next
    /// `resolve` for the same key recreates the workload in place.
    async fn mark_failed(&self, key: &AttachmentKey) -> Result<()>;

    /// Records the workload's phase transition as observed by the
    /// workload manager.
    async fn set_phase(&self, key: &AttachmentKey, phase: WorkloadPhase) -> Result<()>;
}

/// The production coordinator: attachment records are `MounterAttachment`
/// custom resources in the cluster, and owner references do the
/// reference counting.
pub struct KubeAttachmentCoordinator {
    client: Client,
    namespace: String,
}

impl KubeAttachmentCoordinator {
    /// Builds a coordinator operating on `MounterAttachment` resources
    /// in `namespace`.
    #[must_use]
    pub fn new(client: Client, namespace: String) -> Self {
        Self { client, namespace }
    }

    fn api(&self) -> Api<MounterAttachment> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn is_not_found(err: &kube::Error) -> bool {
        matches!(err, kube::Error::Api(ae) if ae.code == 404)
    }
}

impl AttachmentCoordinator for KubeAttachmentCoordinator {
    async fn resolve(&self, key: &AttachmentKey, consumer: &ConsumerRef) -> Result<AttachmentHandle> {
        let name = key.resource_name();
        let api = self.api();

        match api.get(&name).await {
            Ok(existing) => {
                debug!(name, "attachment record already exists, reusing");
                add_owner_reference_if_absent(&api, &existing, consumer).await?;
                let phase = existing
                    .status
                    .as_ref()
                    .map_or(WorkloadPhase::Pending, |s| WorkloadPhase::from_str(&s.phase));
                Ok(AttachmentHandle {
                    key: key.clone(),
                    name,
                    namespace: self.namespace.clone(),
                    phase,
                    created: false,
                })
            }
            Err(e) if Self::is_not_found(&e) => {
                info!(name, volume_id = %key.volume_id, node = %key.node, "creating attachment record");
                let mut record = MounterAttachment::new(
                    &name,
                    MounterAttachmentSpec {
                        volume_id: key.volume_id.clone(),
                        node_name: key.node.clone(),
                        bucket: key.volume_id.clone(),
                        credentials_fingerprint: key.fingerprint.to_hex(),
                        fs_group: key.fs_group.clone(),
                        mounter_workload_ref: name.clone(),
                    },
                );
                record.meta_mut().owner_references = Some(vec![consumer_owner_reference(consumer)]);

                match api.create(&PostParams::default(), &record).await {
                    Ok(_) => {
                        set_status(&api, &name, WorkloadPhase::Pending).await?;
                        Ok(AttachmentHandle {
                            key: key.clone(),
                            name,
                            namespace: self.namespace.clone(),
                            phase: WorkloadPhase::Pending,
                            created: true,
                        })
                    }
                    // Another publish raced us and created it first; this
                    // is the create-if-absent primitive from Design Note
                    // "Concurrency primitive" — treat it as a normal
                    // resolve rather than an error.
                    Err(e) if matches!(&e, kube::Error::Api(ae) if ae.code == 409) => {
                        let existing = api
                            .get(&name)
                            .await
                            .map_err(|e| Error::PlatformApi(e.to_string()))?;
                        add_owner_reference_if_absent(&api, &existing, consumer).await?;
                        Ok(AttachmentHandle {
                            key: key.clone(),
                            name,
                            namespace: self.namespace.clone(),
                            phase: WorkloadPhase::Pending,
                            created: false,
                        })
                    }
                    Err(e) => Err(Error::PlatformApi(e.to_string())),
                }
            }
            Err(e) => Err(Error::PlatformApi(e.to_string())),
        }
    }

    async fn release(&self, key: &AttachmentKey, consumer: &ConsumerRef) -> Result<ReleaseOutcome> {
        let name = key.resource_name();
        let api = self.api();

        let existing = match api.get(&name).await {
            Ok(existing) => existing,
            Err(e) if Self::is_not_found(&e) => return Ok(ReleaseOutcome::Retired),
            Err(e) => return Err(Error::PlatformApi(e.to_string())),
        };

        let remaining: Vec<OwnerReference> = existing
            .owner_references()
            .iter()
            .filter(|o| o.uid != consumer.uid)
            .cloned()
            .collect();

        if remaining.is_empty() {
            info!(name, "last consumer reference dropped, deleting attachment record");
            match api.delete(&name, &DeleteParams::default()).await {
                Ok(_) => {}
                Err(e) if Self::is_not_found(&e) => {}
                Err(e) => return Err(Error::PlatformApi(e.to_string())),
            }
            return Ok(ReleaseOutcome::Retired);
        }

        let patch = serde_json::json!({ "metadata": { "ownerReferences": remaining } });
        api.patch(&name, &PatchParams::apply("mountpoint-csi-attach"), &Patch::Merge(&patch))
            .await
            .map_err(|e| Error::PlatformApi(e.to_string()))?;
        Ok(ReleaseOutcome::StillReferenced)
    }

    async fn mark_failed(&self, key: &AttachmentKey) -> Result<()> {
        self.set_phase(key, WorkloadPhase::Failed).await
    }

    async fn set_phase(&self, key: &AttachmentKey, phase: WorkloadPhase) -> Result<()> {
        let name = key.resource_name();
        set_status(&self.api(), &name, phase).await
    }
}

async fn set_status(api: &Api<MounterAttachment>, name: &str, phase: WorkloadPhase) -> Result<()> {
    let patch = serde_json::json!({ "status": MounterAttachmentStatus { phase: phase.as_str().to_string() } });
    api.patch_status(name, &PatchParams::apply("mountpoint-csi-attach"), &Patch::Merge(&patch))
        .await
        .map_err(|e| Error::PlatformApi(e.to_string()))?;
    Ok(())
}

async fn add_owner_reference_if_absent(
    api: &Api<MounterAttachment>,
    existing: &MounterAttachment,
    consumer: &ConsumerRef,
) -> Result<()> {
    if existing.owner_references().iter().any(|o| o.uid == consumer.uid) {
        return Ok(());
    }
    let mut owners = existing.owner_references().to_vec();
    owners.push(consumer_owner_reference(consumer));
    warn!(name = %existing.name_any(), consumer = %consumer.name, "adding consumer reference to existing attachment");
    let patch = serde_json::json!({ "metadata": { "ownerReferences": owners } });
    api.patch(
        &existing.name_any(),
        &PatchParams::apply("mountpoint-csi-attach"),
        &Patch::Merge(&patch),
    )
    .await
    .map_err(|e| Error::PlatformApi(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use mountpoint_csi_creds::CredentialsFingerprint;
    use mountpoint_csi_objectstore::StorageCredentials;

    /// In-memory stand-in for [`AttachmentCoordinator`] used by this
    /// crate's own unit tests; `mountpoint-csi-node`'s integration
    /// tests define their own, matching fakes per crate rather than a
    /// shared test double.
    #[derive(Default)]
    struct FakeCoordinator {
        records: Mutex<HashMap<String, (Vec<String>, WorkloadPhase)>>,
    }

    impl AttachmentCoordinator for FakeCoordinator {
        async fn resolve(&self, key: &AttachmentKey, consumer: &ConsumerRef) -> Result<AttachmentHandle> {
            let name = key.resource_name();
            let mut records = self.records.lock().unwrap();
            let created = !records.contains_key(&name);
            let entry = records
                .entry(name.clone())
                .or_insert_with(|| (Vec::new(), WorkloadPhase::Pending));
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

        async fn release(&self, key: &AttachmentKey, consumer: &ConsumerRef) -> Result<ReleaseOutcome> {
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

        async fn mark_failed(&self, key: &AttachmentKey) -> Result<()> {
            self.set_phase(key, WorkloadPhase::Failed).await
        }

        async fn set_phase(&self, key: &AttachmentKey, phase: WorkloadPhase) -> Result<()> {
            let name = key.resource_name();
            if let Some(entry) = self.records.lock().unwrap().get_mut(&name) {
                entry.1 = phase;
            }
            Ok(())
        }
    }

    fn key(volume: &str, node: &str, fs_group: Option<&str>) -> AttachmentKey {
        AttachmentKey {
            volume_id: volume.to_string(),
            node: node.to_string(),
            fingerprint: CredentialsFingerprint::compute(
                "driver-credentials",
                &StorageCredentials {
                    access_key_id: "AK".to_string(),
                    secret_access_key: "SK".to_string(),
                    session_token: None,
                    region: None,
                },
            ),
            fs_group: fs_group.map(str::to_string),
        }
    }

    fn consumer(name: &str) -> ConsumerRef {
        ConsumerRef {
            kind: "Pod".to_string(),
            name: name.to_string(),
            uid: format!("uid-{name}"),
        }
    }

    #[tokio::test]
    async fn second_resolve_for_same_key_does_not_recreate() {
        let coordinator = FakeCoordinator::default();
        let key = key("v1", "node-a", None);

        let first = coordinator.resolve(&key, &consumer("pod-1")).await.unwrap();
        let second = coordinator.resolve(&key, &consumer("pod-2")).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.name, second.name);
    }

    #[tokio::test]
    async fn release_keeps_workload_while_other_consumer_remains() {
        let coordinator = FakeCoordinator::default();
        let key = key("v1", "node-a", None);
        coordinator.resolve(&key, &consumer("pod-1")).await.unwrap();
        coordinator.resolve(&key, &consumer("pod-2")).await.unwrap();

        let outcome = coordinator.release(&key, &consumer("pod-1")).await.unwrap();
        assert_eq!(outcome, ReleaseOutcome::StillReferenced);
    }

    #[tokio::test]
    async fn release_of_last_consumer_retires_the_workload() {
        let coordinator = FakeCoordinator::default();
        let key = key("v1", "node-a", None);
        coordinator.resolve(&key, &consumer("pod-1")).await.unwrap();

        let outcome = coordinator.release(&key, &consumer("pod-1")).await.unwrap();
        assert_eq!(outcome, ReleaseOutcome::Retired);

        // Idempotent: releasing again (e.g. a retried unpublish) is a no-op.
        let again = coordinator.release(&key, &consumer("pod-1")).await.unwrap();
        assert_eq!(again, ReleaseOutcome::Retired);
    }

    #[tokio::test]
    async fn differing_fs_group_yields_separate_workloads() {
        let coordinator = FakeCoordinator::default();
        let a = key("v1", "node-a", Some("1000"));
        let b = key("v1", "node-a", Some("2000"));

        let handle_a = coordinator.resolve(&a, &consumer("pod-1")).await.unwrap();
        let handle_b = coordinator.resolve(&b, &consumer("pod-2")).await.unwrap();

        assert_ne!(handle_a.name, handle_b.name);
    }

    #[tokio::test]
    async fn marking_failed_is_observed_on_next_resolve() {
        let coordinator = FakeCoordinator::default();
        let key = key("v1", "node-a", None);
        coordinator.resolve(&key, &consumer("pod-1")).await.unwrap();
        coordinator.mark_failed(&key).await.unwrap();

        let handle = coordinator.resolve(&key, &consumer("pod-1")).await.unwrap();
        assert_eq!(handle.phase, WorkloadPhase::Failed);
    }
}
