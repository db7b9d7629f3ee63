//! The attachment record: a cluster-scoped custom resource mapping a
//! sharing key to a mounter workload. Short alias `s3pa` for operators.
//!
//! This is the only durable state the core writes, per Design Note
//! "Cluster-scoped records with owner-reference GC":
//! reference counting rides on Kubernetes owner references rather than
//! a count kept in driver memory.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// `spec` of a [`MounterAttachment`].
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[kube(
    group = "csi.scality.com",
    version = "v1",
    kind = "MounterAttachment",
    plural = "mounterattachments",
    shortname = "s3pa",
    namespaced,
    status = "MounterAttachmentStatus",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct MounterAttachmentSpec {
    /// The volume this attachment serves.
    pub volume_id: String,
    /// The node the mounter workload is pinned to.
    pub node_name: String,
    /// The backing bucket.
    pub bucket: String,
    /// Hex-encoded fingerprint of the credentials in use.
    pub credentials_fingerprint: String,
    /// The caller-supplied fsGroup, if any.
    pub fs_group: Option<String>,
    /// Name of the mounter workload (Pod) this record owns.
    pub mounter_workload_ref: String,
}

/// `status` of a [`MounterAttachment`], mirroring the mounter
/// workload's lifecycle phase as last observed by the workload manager.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MounterAttachmentStatus {
    /// The workload phase, as a string so it round-trips through the
    /// API server without a CRD schema migration when new phases are
    /// added.
    pub phase: String,
}

/// The mounter-workload lifecycle phases observed by the workload
/// manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkloadPhase {
    /// The workload was just created; the driver hasn't observed
    /// readiness yet.
    Pending,
    /// The workload's rendezvous socket accepted a connection.
    Ready,
    /// The FD handoff was acknowledged; the mounter is serving.
    Serving,
    /// The attachment record was deleted; the workload is being torn
    /// down.
    Terminating,
    /// The workload failed; the next publish against this key will
    /// recreate it.
    Failed,
}

impl WorkloadPhase {
    /// Renders the phase as the string stored in
    /// [`MounterAttachmentStatus::phase`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Ready => "Ready",
            Self::Serving => "Serving",
            Self::Terminating => "Terminating",
            Self::Failed => "Failed",
        }
    }

    /// Parses the phase back out of the status string; unrecognized or
    /// missing values are treated as `Failed` so a stale/corrupted
    /// status drives a re-create rather than silently wedging.
    #[must_use]
    pub fn from_str(raw: &str) -> Self {
        match raw {
            "Pending" => Self::Pending,
            "Ready" => Self::Ready,
            "Serving" => Self::Serving,
            "Terminating" => Self::Terminating,
            _ => Self::Failed,
        }
    }
}

/// Builds an [`OwnerReference`] pointing at the consuming workload
/// (the Pod whose volume mount this attachment serves), so its deletion
/// cascades to the attachment record once no other consumer references
/// remain.
#[must_use]
pub fn consumer_owner_reference(consumer: &ConsumerRef) -> OwnerReference {
    OwnerReference {
        api_version: "v1".to_string(),
        kind: consumer.kind.clone(),
        name: consumer.name.clone(),
        uid: consumer.uid.clone(),
        controller: Some(false),
        block_owner_deletion: Some(true),
        ..Default::default()
    }
}

/// Identifies the workload consuming a volume mount, used to attach an
/// owner reference to its attachment record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerRef {
    /// The consumer's Kubernetes kind (almost always `Pod`).
    pub kind: String,
    /// The consumer's name.
    pub name: String,
    /// The consumer's stable UID, used for the owner reference.
    pub uid: String,
}
