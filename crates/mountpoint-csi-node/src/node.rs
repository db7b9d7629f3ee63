//! The CSI `Node` service: publish/unpublish
//! a bucket onto a target path, sharing one mounter workload's FUSE
//! mount across every publish that resolves to the same attachment key.
//!
//! `NodeStageVolume`/`NodeUnstageVolume` are no-ops: this driver mounts
//! directly at the publish target rather than a staging path, so there
//! is nothing to do at either end of the staging lifecycle.

use std::path::Path;
use std::time::{Duration, Instant};

use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};

use mountpoint_csi_args::{build_invocation, parse_volume_context, MountOptions, MounterCredentials, VolumeContext};
use mountpoint_csi_attach::{
    AttachmentCoordinator, AttachmentHandle, AttachmentKey, ConsumerRef, HandoffRequest, MounterWorkloadManager,
    ReleaseOutcome, WorkloadPhase,
};
use mountpoint_csi_creds::{CredentialProvider, CredentialsFingerprint, Operation, ResolvedCredentials, SecretSource};
use mountpoint_csi_mount::{MountPrimitives, MountState};
use mountpoint_csi_proto::csi::node_server::Node;
use mountpoint_csi_proto::csi::{
    volume_capability, NodeExpandVolumeRequest, NodeExpandVolumeResponse, NodeGetCapabilitiesRequest,
    NodeGetCapabilitiesResponse, NodeGetInfoRequest, NodeGetInfoResponse, NodeGetVolumeStatsRequest,
    NodeGetVolumeStatsResponse, NodePublishVolumeRequest, NodePublishVolumeResponse, NodeStageVolumeRequest,
    NodeStageVolumeResponse, NodeUnpublishVolumeRequest, NodeUnpublishVolumeResponse, NodeUnstageVolumeRequest,
    NodeUnstageVolumeResponse, VolumeCapability,
};
use mountpoint_csi_proto::CsiError;

use crate::convert::{args_err, attach_err, creds_err, mount_err};
use crate::locks::PublishLocks;
use crate::state::{PublishRecord, PublishState};

/// Volume-context key carrying the fsGroup a publish should apply;
/// this driver's own extension since object storage has no POSIX
/// ownership for kubelet to reconcile on its own.
const FS_GROUP_CONTEXT_KEY: &str = "csi.scality.com/fsGroup";
/// Standard kubelet-injected key naming the consuming Pod, present when
/// the `CSIDriver`'s `podInfoOnMount` is enabled.
const POD_NAME_CONTEXT_KEY: &str = "csi.storage.k8s.io/pod.name";
/// See [`POD_NAME_CONTEXT_KEY`].
const POD_UID_CONTEXT_KEY: &str = "csi.storage.k8s.io/pod.uid";

/// The node plugin: resolves a publish's sharing key, ensures the
/// mounter workload backing it is running and serving, and bind-mounts
/// the canonical FUSE mount into the CSI target path.
pub struct NodeService<A, W, M, S> {
    node_name: String,
    endpoint_url: String,
    default_region: String,
    coordinator: A,
    workload: W,
    mount: M,
    credentials: CredentialProvider<S>,
    locks: PublishLocks,
    state: PublishState,
    workload_ready_deadline: Duration,
    publish_deadline: Duration,
}

impl<A, W, M, S> NodeService<A, W, M, S>
where
    A: AttachmentCoordinator,
    W: MounterWorkloadManager,
    M: MountPrimitives,
    S: SecretSource,
{
    /// Builds a node service for `node_name`, talking to the object
    /// store at `endpoint_url` and falling back to `default_region`
    /// when neither resolved credentials nor the volume context
    /// override it. `workload_ready_deadline` bounds waiting for the
    /// mounter workload to come up; `publish_deadline` bounds the whole
    /// publish (SPEC §4.8/§5) and must be at least that long to be
    /// useful.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        node_name: String,
        endpoint_url: String,
        default_region: String,
        coordinator: A,
        workload: W,
        mount: M,
        credentials: CredentialProvider<S>,
        state: PublishState,
        workload_ready_deadline: Duration,
        publish_deadline: Duration,
    ) -> Self {
        Self {
            node_name,
            endpoint_url,
            default_region,
            coordinator,
            workload,
            mount,
            credentials,
            locks: PublishLocks::new(),
            state,
            workload_ready_deadline,
            publish_deadline,
        }
    }

    /// The attachment coordinator this service resolves sharing keys
    /// against; exposed for scenario tests that need to observe how many
    /// workloads are currently tracked.
    pub fn coordinator(&self) -> &A {
        &self.coordinator
    }

    /// The mounter-workload manager this service hands FUSE fds off to;
    /// exposed for scenario tests.
    pub fn workload(&self) -> &W {
        &self.workload
    }

    /// The mount primitives this service binds targets through; exposed
    /// for scenario tests.
    pub fn mount(&self) -> &M {
        &self.mount
    }

    /// Ensures the mounter workload behind `handle` is running and has
    /// accepted the FD handoff for `context`/`options`/`resolved`
    ///. Only called when the
    /// resolved handle is not already [`WorkloadPhase::Serving`].
    async fn start_serving(
        &self,
        handle: &AttachmentHandle,
        context: &VolumeContext,
        options: &MountOptions,
        resolved: &ResolvedCredentials,
        read_only: bool,
    ) -> Result<(), CsiError> {
        self.workload
            .ensure_running(handle, self.workload_ready_deadline)
            .await
            .map_err(attach_err)?;

        let source_path = self.workload.mount_source_path(handle);
        let credentials = MounterCredentials {
            access_key_id: resolved.storage.access_key_id.clone(),
            secret_access_key: resolved.storage.secret_access_key.clone(),
            session_token: resolved.storage.session_token.clone(),
        };
        let invocation = build_invocation(
            &context.bucket_name,
            &source_path.display().to_string(),
            &self.endpoint_url,
            &self.default_region,
            options,
            &credentials,
        );

        let request = HandoffRequest {
            argv: invocation.argv,
            env: invocation
                .env
                .into_iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect(),
            bucket: context.bucket_name.clone(),
            target_path: source_path,
            read_only,
            options: options.clone(),
        };
        self.workload.handoff(handle, request).await.map_err(attach_err)
    }

    /// Undoes a [`AttachmentCoordinator::resolve`] whose subsequent
    /// [`Self::start_serving`] failed.
    async fn rollback_resolve(&self, key: &AttachmentKey, consumer: &ConsumerRef, handle: &AttachmentHandle) {
        if handle.created {
            if let Err(e) = self.workload.retire(handle).await {
                warn!(error = %e, workload = %handle.name, "failed to retire newly created workload during rollback");
            }
        } else if let Err(e) = self.coordinator.mark_failed(key).await {
            warn!(error = %e, key = %handle.name, "failed to mark shared attachment as failed during rollback");
        }
        if let Err(e) = self.coordinator.release(key, consumer).await {
            warn!(error = %e, consumer = %consumer.name, "failed to release attachment reference during rollback");
        }
    }
}

/// Runs `fut` against the time remaining until `deadline`, converting
/// both an already-elapsed deadline and a mid-flight timeout into
/// [`CsiError::DeadlineExceeded`]. Used to bound the blocking steps of a
/// publish (credential fetch, attachment resolution, workload
/// readiness/handoff) by the caller's overall publish deadline (SPEC
/// §4.8, §5) while still surfacing the elapse as an ordinary `Err` that
/// flows through the existing reverse-order rollback.
async fn await_with_deadline<T>(
    deadline: Instant,
    fut: impl std::future::Future<Output = Result<T, CsiError>>,
) -> Result<T, CsiError> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return Err(CsiError::deadline_exceeded("publish deadline exceeded"));
    }
    match tokio::time::timeout(remaining, fut).await {
        Ok(result) => result,
        Err(_) => Err(CsiError::deadline_exceeded("publish deadline exceeded")),
    }
}

fn validate_publish_request(req: &NodePublishVolumeRequest) -> Result<Vec<String>, Status> {
    if req.volume_id.is_empty() {
        return Err(Status::invalid_argument("volume_id is required"));
    }
    if req.target_path.is_empty() || !req.target_path.starts_with('/') {
        return Err(Status::invalid_argument("target_path must be an absolute path"));
    }
    let capability = req
        .volume_capability
        .as_ref()
        .ok_or_else(|| Status::invalid_argument("volume_capability is required"))?;
    mount_flags(capability)
}

fn mount_flags(capability: &VolumeCapability) -> Result<Vec<String>, Status> {
    match &capability.access_type {
        Some(volume_capability::AccessType::Mount(mount)) => Ok(mount.mount_flags.clone()),
        Some(volume_capability::AccessType::Block(_)) => {
            Err(Status::invalid_argument("block volumes are not supported"))
        }
        None => Err(Status::invalid_argument("volume_capability.access_type is required")),
    }
}

/// Builds the synthetic handle [`MounterWorkloadManager`] needs to
/// locate a workload from its sharing key alone — every method it
/// implements reads only [`AttachmentHandle::name`], which
/// [`AttachmentKey::resource_name`] derives deterministically, so no
/// record lookup is needed to rebuild it.
fn handle_for_key(key: &AttachmentKey) -> AttachmentHandle {
    AttachmentHandle {
        key: key.clone(),
        name: key.resource_name(),
        namespace: String::new(),
        phase: WorkloadPhase::Terminating,
        created: false,
    }
}

#[tonic::async_trait]
impl<A, W, M, S> Node for NodeService<A, W, M, S>
where
    A: AttachmentCoordinator + 'static,
    W: MounterWorkloadManager + 'static,
    M: MountPrimitives + 'static,
    S: SecretSource + 'static,
{
    async fn node_stage_volume(
        &self,
        _request: Request<NodeStageVolumeRequest>,
    ) -> Result<Response<NodeStageVolumeResponse>, Status> {
        Ok(Response::new(NodeStageVolumeResponse {}))
    }

    async fn node_unstage_volume(
        &self,
        _request: Request<NodeUnstageVolumeRequest>,
    ) -> Result<Response<NodeUnstageVolumeResponse>, Status> {
        Ok(Response::new(NodeUnstageVolumeResponse {}))
    }

    async fn node_publish_volume(
        &self,
        request: Request<NodePublishVolumeRequest>,
    ) -> Result<Response<NodePublishVolumeResponse>, Status> {
        let req = request.into_inner();
        let mut raw_tokens = validate_publish_request(&req)?;
        if req.readonly {
            raw_tokens.push("read-only".to_string());
        }

        let deadline = Instant::now() + self.publish_deadline;
        let target_path = req.target_path.clone();
        let _guard = self.locks.lock(&req.volume_id, &target_path).await;
        let target = Path::new(&target_path);

        match self.mount.check_mountpoint(target).map_err(mount_err)? {
            MountState::MountedByDriver => {
                let corrupted = self.mount.is_corrupted(target).map_err(mount_err)?;
                let matches = self
                    .state
                    .get(&target_path)
                    .is_some_and(|record| record.volume_id == req.volume_id);
                if matches && !corrupted {
                    info!(volume_id = %req.volume_id, target = %target_path, "already published, returning success");
                    return Ok(Response::new(NodePublishVolumeResponse {}));
                }
                warn!(target = %target_path, corrupted, "re-publishing over an existing driver mount");
                self.mount.unmount(target).map_err(mount_err)?;
            }
            MountState::MountedByOther => {
                return Err(
                    CsiError::internal(format!("target {target_path} is mounted by a foreign filesystem")).into(),
                );
            }
            MountState::NotMounted => {}
        }

        let context = parse_volume_context(&req.volume_context).map_err(args_err)?;
        let mut options = MountOptions::parse(&raw_tokens).map_err(args_err)?;
        let fs_group = req.volume_context.get(FS_GROUP_CONTEXT_KEY).cloned();
        if let Some(group) = &fs_group {
            options.apply_fs_group(group);
        }
        options.ensure_foreground();

        let resolved = await_with_deadline(deadline, async {
            self.credentials.resolve(Operation::NodePublish(&context)).await.map_err(creds_err)
        })
        .await?;

        let pod_name = req.volume_context.get(POD_NAME_CONTEXT_KEY).cloned().unwrap_or_default();
        let pod_uid = req
            .volume_context
            .get(POD_UID_CONTEXT_KEY)
            .cloned()
            .unwrap_or_else(|| target_path.clone());
        let consumer = ConsumerRef {
            kind: "Pod".to_string(),
            name: pod_name.clone(),
            uid: pod_uid.clone(),
        };

        let key = AttachmentKey {
            volume_id: req.volume_id.clone(),
            node: self.node_name.clone(),
            fingerprint: resolved.fingerprint,
            fs_group: fs_group.clone(),
        };

        let handle = await_with_deadline(deadline, async {
            self.coordinator.resolve(&key, &consumer).await.map_err(attach_err)
        })
        .await?;

        if handle.phase != WorkloadPhase::Serving {
            let start_result = await_with_deadline(
                deadline,
                self.start_serving(&handle, &context, &options, &resolved, req.readonly),
            )
            .await;
            if let Err(e) = start_result {
                self.rollback_resolve(&key, &consumer, &handle).await;
                return Err(e.into());
            }
            self.coordinator
                .set_phase(&key, WorkloadPhase::Serving)
                .await
                .map_err(attach_err)?;
        }

        let target_existed = target.exists();
        if !target_existed {
            std::fs::create_dir_all(target)
                .map_err(|e| CsiError::internal(format!("creating target dir {target_path}: {e}")))?;
        }

        let source_path = self.workload.mount_source_path(&handle);
        if let Err(e) = self.mount.bind_mount(&source_path, target) {
            if !target_existed {
                let _ = std::fs::remove_dir(target);
            }
            if let Err(release_err) = self.coordinator.release(&key, &consumer).await {
                warn!(error = %release_err, "failed to release attachment reference after a failed bind mount");
            }
            return Err(mount_err(e).into());
        }

        let record = PublishRecord {
            volume_id: req.volume_id.clone(),
            node: self.node_name.clone(),
            fingerprint_hex: resolved.fingerprint.to_hex(),
            fs_group,
            pod_name,
            pod_uid,
        };
        if let Err(e) = self.state.insert(&target_path, record) {
            warn!(error = %e, target = %target_path, "failed to persist publish state");
        }

        Ok(Response::new(NodePublishVolumeResponse {}))
    }

    async fn node_unpublish_volume(
        &self,
        request: Request<NodeUnpublishVolumeRequest>,
    ) -> Result<Response<NodeUnpublishVolumeResponse>, Status> {
        let req = request.into_inner();
        if req.volume_id.is_empty() {
            return Err(Status::invalid_argument("volume_id is required"));
        }
        if req.target_path.is_empty() {
            return Err(Status::invalid_argument("target_path is required"));
        }

        let target_path = req.target_path.clone();
        let _guard = self.locks.lock(&req.volume_id, &target_path).await;
        let target = Path::new(&target_path);

        if self.mount.check_mountpoint(target).map_err(mount_err)? == MountState::NotMounted {
            if let Err(e) = self.state.remove(&target_path) {
                warn!(error = %e, target = %target_path, "failed to clear stale publish state");
            }
            return Ok(Response::new(NodeUnpublishVolumeResponse {}));
        }

        self.mount.unmount(target).map_err(mount_err)?;

        if target.exists() {
            if let Err(e) = std::fs::remove_dir(target) {
                debug!(target = %target_path, error = %e, "target directory not empty after unmount, leaving in place");
            }
        }

        let record = self
            .state
            .remove(&target_path)
            .map_err(|e| CsiError::internal(format!("clearing publish state for {target_path}: {e}")))?;

        if let Some(record) = record {
            if let Some(fingerprint) = CredentialsFingerprint::from_hex(&record.fingerprint_hex) {
                let key = AttachmentKey {
                    volume_id: record.volume_id,
                    node: record.node,
                    fingerprint,
                    fs_group: record.fs_group,
                };
                let consumer = ConsumerRef {
                    kind: "Pod".to_string(),
                    name: record.pod_name,
                    uid: record.pod_uid,
                };
                if self.coordinator.release(&key, &consumer).await.map_err(attach_err)? == ReleaseOutcome::Retired {
                    let handle = handle_for_key(&key);
                    let source_path = self.workload.mount_source_path(&handle);
                    if let Err(e) = self.mount.unmount(&source_path) {
                        warn!(error = %e, path = %source_path.display(), "failed to unmount the retired mounter workload's FUSE mount");
                    }
                    if let Err(e) = self.workload.retire(&handle).await {
                        warn!(error = %e, workload = %handle.name, "failed to retire mounter workload");
                    }
                }
            } else {
                warn!(target = %target_path, "publish record had an unparseable credentials fingerprint, cannot release attachment reference");
            }
        }

        Ok(Response::new(NodeUnpublishVolumeResponse {}))
    }

    async fn node_get_volume_stats(
        &self,
        _request: Request<NodeGetVolumeStatsRequest>,
    ) -> Result<Response<NodeGetVolumeStatsResponse>, Status> {
        Err(Status::unimplemented("NodeGetVolumeStats is not supported"))
    }

    async fn node_expand_volume(
        &self,
        _request: Request<NodeExpandVolumeRequest>,
    ) -> Result<Response<NodeExpandVolumeResponse>, Status> {
        Err(Status::unimplemented("NodeExpandVolume is not supported"))
    }

    async fn node_get_capabilities(
        &self,
        _request: Request<NodeGetCapabilitiesRequest>,
    ) -> Result<Response<NodeGetCapabilitiesResponse>, Status> {
        // Publish/unpublish is mandatory CSI surface and never listed as
        // an optional capability; staging, volume stats, expansion, and
        // volume condition are all unsupported, so the list is empty.
        Ok(Response::new(NodeGetCapabilitiesResponse { capabilities: Vec::new() }))
    }

    async fn node_get_info(
        &self,
        _request: Request<NodeGetInfoRequest>,
    ) -> Result<Response<NodeGetInfoResponse>, Status> {
        Ok(Response::new(NodeGetInfoResponse {
            node_id: self.node_name.clone(),
            max_volumes_per_node: 0,
            accessible_topology: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;

    use mountpoint_csi_creds::RawSecret;
    use mountpoint_csi_proto::csi::{volume_capability::AccessType, MountVolume};

    use crate::testing::{FakeCoordinator, FakeMount, FakeSecretSource, FakeWorkload};

    fn driver_secret() -> RawSecret {
        RawSecret {
            access_key_id: Some("DRIVER_AK".to_string()),
            secret_access_key: Some("DRIVER_SK".to_string()),
            session_token: None,
            region: None,
        }
    }

    fn service(
        dir: &tempfile::TempDir,
    ) -> NodeService<FakeCoordinator, FakeWorkload, FakeMount, FakeSecretSource> {
        NodeService::new(
            "node-a".to_string(),
            "https://s3.example.com".to_string(),
            "us-east-1".to_string(),
            FakeCoordinator::default(),
            FakeWorkload::default(),
            FakeMount::default(),
            CredentialProvider::new(FakeSecretSource::default(), driver_secret()),
            PublishState::open(&dir.path().join("state.json")),
            Duration::from_secs(5),
            Duration::from_secs(120),
        )
    }

    fn mount_capability() -> VolumeCapability {
        VolumeCapability {
            access_type: Some(AccessType::Mount(MountVolume { fs_type: String::new(), mount_flags: vec![] })),
            access_mode: None,
        }
    }

    fn context() -> HashMap<String, String> {
        [("bucketName".to_string(), "my-bucket".to_string())].into_iter().collect()
    }

    fn publish_request(target: &str) -> NodePublishVolumeRequest {
        NodePublishVolumeRequest {
            volume_id: "vol-1".to_string(),
            staging_target_path: String::new(),
            target_path: target.to_string(),
            volume_capability: Some(mount_capability()),
            readonly: false,
            secrets: HashMap::new(),
            volume_context: context(),
        }
    }

    #[tokio::test]
    async fn publish_rejects_relative_target_path() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);
        let mut req = publish_request("relative/path");
        req.target_path = "relative/path".to_string();
        let err = svc.node_publish_volume(Request::new(req)).await.unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn publish_rejects_block_volumes() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);
        let target = dir.path().join("target");
        let mut req = publish_request(target.to_str().unwrap());
        req.volume_capability = Some(VolumeCapability {
            access_type: Some(AccessType::Block(mountpoint_csi_proto::csi::volume_capability::BlockVolume {})),
            access_mode: None,
        });
        let err = svc.node_publish_volume(Request::new(req)).await.unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn publish_past_its_deadline_fails_and_leaves_no_workload_behind() {
        let dir = tempfile::tempdir().unwrap();
        let svc = NodeService::new(
            "node-a".to_string(),
            "https://s3.example.com".to_string(),
            "us-east-1".to_string(),
            FakeCoordinator::default(),
            FakeWorkload::default().with_ensure_running_delay(Duration::from_millis(50)),
            FakeMount::default(),
            CredentialProvider::new(FakeSecretSource::default(), driver_secret()),
            PublishState::open(&dir.path().join("state.json")),
            Duration::from_secs(5),
            Duration::from_millis(5),
        );
        let target = dir.path().join("target");
        let req = publish_request(target.to_str().unwrap());

        let err = svc.node_publish_volume(Request::new(req)).await.unwrap_err();
        assert_eq!(err.code(), tonic::Code::DeadlineExceeded);
        assert_eq!(svc.workload.handoff_count(), 0);
        assert_eq!(svc.coordinator.live_workload_count(), 0);
    }

    #[tokio::test]
    async fn publish_then_unpublish_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);
        let target = dir.path().join("target");
        let req = publish_request(target.to_str().unwrap());

        svc.node_publish_volume(Request::new(req)).await.unwrap();
        assert_eq!(svc.workload.handoff_count(), 1);

        let unpublish = NodeUnpublishVolumeRequest {
            volume_id: "vol-1".to_string(),
            target_path: target.to_str().unwrap().to_string(),
        };
        svc.node_unpublish_volume(Request::new(unpublish)).await.unwrap();
        assert!(svc.state.get(target.to_str().unwrap()).is_none());
    }

    #[tokio::test]
    async fn republishing_the_same_target_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);
        let target = dir.path().join("target");

        svc.node_publish_volume(Request::new(publish_request(target.to_str().unwrap())))
            .await
            .unwrap();
        svc.node_publish_volume(Request::new(publish_request(target.to_str().unwrap())))
            .await
            .unwrap();

        // A second publish that is already satisfied must not hand off
        // a second time.
        assert_eq!(svc.workload.handoff_count(), 1);
    }

    #[tokio::test]
    async fn two_targets_sharing_a_key_share_one_handoff() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);
        let target_a = dir.path().join("a");
        let target_b = dir.path().join("b");

        svc.node_publish_volume(Request::new(publish_request(target_a.to_str().unwrap())))
            .await
            .unwrap();
        svc.node_publish_volume(Request::new(publish_request(target_b.to_str().unwrap())))
            .await
            .unwrap();

        assert_eq!(svc.workload.handoff_count(), 1);
    }

    #[tokio::test]
    async fn unpublish_of_unknown_target_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);
        let req = NodeUnpublishVolumeRequest {
            volume_id: "vol-1".to_string(),
            target_path: "/nowhere".to_string(),
        };
        svc.node_unpublish_volume(Request::new(req)).await.unwrap();
    }

    #[tokio::test]
    async fn node_get_info_reports_the_configured_node_name() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);
        let response = svc
            .node_get_info(Request::new(NodeGetInfoRequest {}))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.node_id, "node-a");
    }

    #[tokio::test]
    async fn volume_stats_and_expand_are_unimplemented() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);
        assert_eq!(
            svc.node_get_volume_stats(Request::new(NodeGetVolumeStatsRequest {
                volume_id: "vol-1".to_string(),
                volume_path: "/x".to_string(),
            }))
            .await
            .unwrap_err()
            .code(),
            tonic::Code::Unimplemented
        );
    }
}
