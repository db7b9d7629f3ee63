//! End-to-end scenario tests driving [`NodeService`]/[`ControllerService`]
//! through the `tonic`-generated `Node`/`Controller` traits with the
//! in-memory fakes from [`mountpoint_csi_node::testing`] standing in for
//! the cluster API and the kernel mount namespace.

use std::collections::HashMap;
use std::time::Duration;

use tonic::Request;

use mountpoint_csi_creds::CredentialProvider;
use mountpoint_csi_node::controller::ControllerService;
use mountpoint_csi_node::node::NodeService;
use mountpoint_csi_node::state::PublishState;
use mountpoint_csi_node::testing::{FakeCoordinator, FakeMount, FakeSecretSource, FakeWorkload, SharedFakeFactory};
use mountpoint_csi_proto::csi::controller_server::Controller;
use mountpoint_csi_proto::csi::node_server::Node;
use mountpoint_csi_proto::csi::volume_capability::{access_mode::Mode as AccessModeKind, AccessMode, AccessType, MountVolume};
use mountpoint_csi_proto::csi::{
    CreateVolumeRequest, DeleteVolumeRequest, NodePublishVolumeRequest, NodeUnpublishVolumeRequest, VolumeCapability,
};

const FS_GROUP_CONTEXT_KEY: &str = "csi.scality.com/fsGroup";

fn mount_capability_with_flags(flags: Vec<String>) -> VolumeCapability {
    VolumeCapability {
        access_type: Some(AccessType::Mount(MountVolume { fs_type: String::new(), mount_flags: flags })),
        access_mode: None,
    }
}

fn node_service(
    dir: &tempfile::TempDir,
) -> NodeService<FakeCoordinator, FakeWorkload, FakeMount, FakeSecretSource> {
    let driver_secret = mountpoint_csi_creds::RawSecret {
        access_key_id: Some("DRIVER_AK".to_string()),
        secret_access_key: Some("DRIVER_SK".to_string()),
        session_token: None,
        region: None,
    };
    NodeService::new(
        "node-a".to_string(),
        "https://s3.example.com".to_string(),
        "us-east-1".to_string(),
        FakeCoordinator::default(),
        FakeWorkload::default(),
        FakeMount::default(),
        CredentialProvider::new(FakeSecretSource::default(), driver_secret),
        PublishState::open(&dir.path().join("state.json")),
        Duration::from_secs(5),
        Duration::from_secs(120),
    )
}

fn publish_request(volume_id: &str, target: &str, context: HashMap<String, String>) -> NodePublishVolumeRequest {
    NodePublishVolumeRequest {
        volume_id: volume_id.to_string(),
        staging_target_path: String::new(),
        target_path: target.to_string(),
        volume_capability: Some(mount_capability_with_flags(vec![])),
        readonly: false,
        secrets: HashMap::new(),
        volume_context: context,
    }
}

fn bucket_context(volume_id: &str) -> HashMap<String, String> {
    [("bucketName".to_string(), volume_id.to_string())].into_iter().collect()
}

/// S1. Static publish, then unpublish: a mounter workload appears, the
/// target becomes a driver mount, and unpublishing tears both down.
#[tokio::test]
async fn s1_static_publish_then_unpublish() {
    let dir = tempfile::tempdir().unwrap();
    let svc = node_service(&dir);
    let target = dir.path().join("t1");

    svc.node_publish_volume(Request::new(publish_request("v1", target.to_str().unwrap(), bucket_context("v1"))))
        .await
        .unwrap();
    assert_eq!(svc.coordinator().live_workload_count(), 1);
    assert_eq!(svc.workload().handoff_count(), 1);
    assert!(svc.mount().is_mounted(&target));

    svc.node_unpublish_volume(Request::new(NodeUnpublishVolumeRequest {
        volume_id: "v1".to_string(),
        target_path: target.to_str().unwrap().to_string(),
    }))
    .await
    .unwrap();

    assert!(!svc.mount().is_mounted(&target));
    assert_eq!(svc.coordinator().live_workload_count(), 0);
    assert_eq!(svc.workload().retire_count(), 1);
}

/// S2. Two publishes for the same volume/credentials/fs-group share
/// exactly one mounter; only the last unpublish retires it.
#[tokio::test]
async fn s2_two_workloads_share_one_mounter() {
    let dir = tempfile::tempdir().unwrap();
    let svc = node_service(&dir);
    let target_a = dir.path().join("t1");
    let target_b = dir.path().join("t2");

    svc.node_publish_volume(Request::new(publish_request("v1", target_a.to_str().unwrap(), bucket_context("v1"))))
        .await
        .unwrap();
    svc.node_publish_volume(Request::new(publish_request("v1", target_b.to_str().unwrap(), bucket_context("v1"))))
        .await
        .unwrap();

    assert_eq!(svc.coordinator().live_workload_count(), 1, "exactly one mounter workload exists");
    assert_eq!(svc.workload().handoff_count(), 1, "the second publish reuses the first's handoff");
    assert!(svc.mount().is_mounted(&target_a));
    assert!(svc.mount().is_mounted(&target_b));

    svc.node_unpublish_volume(Request::new(NodeUnpublishVolumeRequest {
        volume_id: "v1".to_string(),
        target_path: target_a.to_str().unwrap().to_string(),
    }))
    .await
    .unwrap();
    assert_eq!(svc.coordinator().live_workload_count(), 1, "mounter still referenced by target_b");
    assert_eq!(svc.workload().retire_count(), 0);

    svc.node_unpublish_volume(Request::new(NodeUnpublishVolumeRequest {
        volume_id: "v1".to_string(),
        target_path: target_b.to_str().unwrap().to_string(),
    }))
    .await
    .unwrap();
    assert_eq!(svc.coordinator().live_workload_count(), 0);
    assert_eq!(svc.workload().retire_count(), 1);
}

/// S3. A caller-supplied fsGroup overrides the gid mount option while
/// leaving an explicit uid untouched, and injects the fixed sharing
/// flags/modes.
#[tokio::test]
async fn s3_fs_group_override() {
    let dir = tempfile::tempdir().unwrap();
    let svc = node_service(&dir);
    let target = dir.path().join("t1");

    let mut context = bucket_context("v1");
    context.insert(FS_GROUP_CONTEXT_KEY.to_string(), "2000".to_string());
    let mut req = publish_request("v1", target.to_str().unwrap(), context);
    req.volume_capability =
        Some(mount_capability_with_flags(vec!["--gid=1000".to_string(), "--uid=500".to_string()]));

    svc.node_publish_volume(Request::new(req)).await.unwrap();

    let request = svc.workload().last_request().expect("a handoff should have happened");
    assert!(request.argv.contains(&"--gid=2000".to_string()));
    assert!(request.argv.contains(&"--uid=500".to_string()));
    assert!(request.argv.contains(&"--allow-other".to_string()));
    assert!(request.argv.contains(&"--dir-mode=0770".to_string()));
    assert!(request.argv.contains(&"--file-mode=0660".to_string()));
}

fn controller_service() -> (ControllerService<SharedFakeFactory, FakeSecretSource>, SharedFakeFactory) {
    let factory = SharedFakeFactory::default();
    let driver_secret = mountpoint_csi_creds::RawSecret {
        access_key_id: Some("DRIVER_AK".to_string()),
        secret_access_key: Some("DRIVER_SK".to_string()),
        session_token: None,
        region: None,
    };
    let credentials = CredentialProvider::new(FakeSecretSource::new("PROVISIONER_AK", "PROVISIONER_SK", None), driver_secret);
    let service = ControllerService::new(factory.clone(), credentials);
    (service, factory)
}

fn multi_writer_capability() -> VolumeCapability {
    VolumeCapability {
        access_type: Some(AccessType::Mount(MountVolume { fs_type: String::new(), mount_flags: vec![] })),
        access_mode: Some(AccessMode { mode: AccessModeKind::MultiNodeMultiWriter as i32 }),
    }
}

/// S4. Dynamic create with a request-level secret resolves credentials
/// from the request rather than the provisioner secret, and reports
/// `authenticationSource=secret` on the returned volume context.
#[tokio::test]
async fn s4_dynamic_create_with_request_level_secret() {
    let (svc, factory) = controller_service();
    let mut secrets = HashMap::new();
    secrets.insert("access_key_id".to_string(), "AK".to_string());
    secrets.insert("secret_access_key".to_string(), "SK".to_string());
    secrets.insert("region".to_string(), "eu-1".to_string());

    let req = CreateVolumeRequest {
        name: "vol-a".to_string(),
        capacity_range: None,
        volume_capabilities: vec![multi_writer_capability()],
        parameters: HashMap::new(),
        secrets,
    };
    let volume = svc.create_volume(Request::new(req)).await.unwrap().into_inner().volume.unwrap();

    assert_eq!(volume.volume_context.get("authenticationSource").unwrap(), "secret");
    assert_eq!(factory.last_access_key_id(), Some("AK".to_string()));
    assert!(factory.store().bucket_exists(&volume.volume_id));
}

/// S5. Deleting a volume whose bucket still holds objects succeeds
/// without deleting the bucket.
#[tokio::test]
async fn s5_delete_volume_preserves_non_empty_bucket() {
    let (svc, factory) = controller_service();
    factory.store().seed("vol-x", vec!["object-one".to_string()]);

    svc.delete_volume(Request::new(DeleteVolumeRequest { volume_id: "vol-x".to_string(), secrets: HashMap::new() }))
        .await
        .unwrap();

    assert!(factory.store().bucket_exists("vol-x"), "a non-empty bucket must not be deleted");
}

/// S6. Rotating the secret a publish's `authenticationSource=secret`
/// points at changes the resolved credentials' fingerprint, so a new
/// publish for a distinct target after the cache TTL forces a second
/// mounter workload rather than reusing the first.
#[tokio::test]
async fn s6_credential_rotation_forces_a_new_workload() {
    let dir = tempfile::tempdir().unwrap();
    let cache_ttl = Duration::from_millis(20);
    let driver_secret = mountpoint_csi_creds::RawSecret {
        access_key_id: Some("DRIVER_AK".to_string()),
        secret_access_key: Some("DRIVER_SK".to_string()),
        session_token: None,
        region: None,
    };

    let secret_source = std::sync::Arc::new(tokio::sync::Mutex::new(FakeSecretSource::new("AK-1", "SK-1", None)));

    struct RotatingSecretSource {
        inner: std::sync::Arc<tokio::sync::Mutex<FakeSecretSource>>,
    }

    impl mountpoint_csi_creds::SecretSource for RotatingSecretSource {
        async fn fetch_secret(
            &self,
            namespace: &str,
            name: &str,
        ) -> mountpoint_csi_creds::Result<mountpoint_csi_creds::RawSecret> {
            self.inner.lock().await.fetch_secret(namespace, name).await
        }
    }

    let svc = NodeService::new(
        "node-a".to_string(),
        "https://s3.example.com".to_string(),
        "us-east-1".to_string(),
        FakeCoordinator::default(),
        FakeWorkload::default(),
        FakeMount::default(),
        CredentialProvider::with_cache_settings(
            RotatingSecretSource { inner: secret_source.clone() },
            driver_secret,
            8,
            cache_ttl,
        ),
        PublishState::open(&dir.path().join("state.json")),
        Duration::from_secs(5),
        Duration::from_secs(120),
    );

    let mut context = bucket_context("v1");
    context.insert("authenticationSource".to_string(), "secret".to_string());
    context.insert("csi.storage.k8s.io/secret-name".to_string(), "s".to_string());
    context.insert("csi.storage.k8s.io/secret-namespace".to_string(), "ns".to_string());

    let target_a = dir.path().join("t1");
    svc.node_publish_volume(Request::new(publish_request("v1", target_a.to_str().unwrap(), context.clone())))
        .await
        .unwrap();
    assert_eq!(svc.workload().handoff_count(), 1);

    *secret_source.lock().await = FakeSecretSource::new("AK-2", "SK-2", None);
    tokio::time::sleep(cache_ttl * 2).await;

    let target_b = dir.path().join("t2");
    svc.node_publish_volume(Request::new(publish_request("v1", target_b.to_str().unwrap(), context)))
        .await
        .unwrap();

    assert_eq!(svc.workload().handoff_count(), 2, "rotated credentials force a second handoff");
    assert_eq!(svc.coordinator().live_workload_count(), 2, "rotated fingerprint changes the sharing key");
}
