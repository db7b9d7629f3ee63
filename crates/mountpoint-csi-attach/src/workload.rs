//! Mounter-workload manager: creates, watches, and garbage-collects
//! the per-node mounter workload, and
//! mediates the FUSE fd handoff.

use std::path::PathBuf;
use std::time::Duration;

use k8s_openapi::api::core::v1::{
    Container, EmptyDirVolumeSource, Pod, PodSecurityContext, PodSpec, SecurityContext, Volume,
    VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, PostParams};
use kube::Client;
use tracing::{debug, info, warn};

use mountpoint_csi_mount::MountPrimitives;

use crate::coordinator::AttachmentHandle;
use crate::error::{Error, Result};
use crate::rendezvous::{send_mount_request, RequestFrame};

/// The relative path, inside the shared `emptyDir`, of the rendezvous
/// socket.
pub const SOCKET_RELATIVE_PATH: &str = "mount.sock";

/// The mounter image's well-known binary path inside its container.
const MOUNTER_BINARY_PATH: &str = "/usr/bin/mount-s3";

/// The driver's own host-side view of the volume's shared `emptyDir`,
/// used to reach the rendezvous socket without going through the
/// workload's container filesystem.
const SHARED_DIR_HOST_BASE: &str = "/var/lib/kubelet/mountpoint-s3-csi/mounters";

/// Host-side base directory for the canonical FUSE mount each mounter
/// workload owns. Every publish that resolves to the same attachment
/// mounts FUSE once here and bind-mounts this
/// path into each CSI target path, rather than performing a second
/// kernel FUSE mount per target.
const MOUNT_SOURCE_HOST_BASE: &str = "/var/lib/kubelet/mountpoint-s3-csi/mounts";

/// Default per-publish readiness deadline.
pub const DEFAULT_READY_DEADLINE: Duration = Duration::from_secs(30);
const POLL_INITIAL_DELAY: Duration = Duration::from_millis(200);
const POLL_MAX_DELAY: Duration = Duration::from_secs(2);
const POLL_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Computes the poll delay for readiness-wait attempt `attempt`
/// (1-indexed), matching the exponential-backoff shape used elsewhere
/// in the driver's reconnect logic.
fn poll_delay(attempt: u32) -> Duration {
    let factor = POLL_BACKOFF_MULTIPLIER.powi(attempt.saturating_sub(1) as i32);
    let millis = (POLL_INITIAL_DELAY.as_millis() as f64 * factor) as u64;
    Duration::from_millis(millis).min(POLL_MAX_DELAY)
}

/// Everything the workload manager needs to build and hand off a
/// single mount request, independent of how it was assembled.
#[derive(Debug, Clone)]
pub struct HandoffRequest {
    /// The mounter binary's argv.
    pub argv: Vec<String>,
    /// The mounter binary's environment, as `KEY=VALUE` pairs.
    pub env: Vec<String>,
    /// The bucket being mounted.
    pub bucket: String,
    /// The canonical path the kernel FUSE mount is performed at
    /// ([`MounterWorkloadManager::mount_source_path`]), not the CSI
    /// target path a given publish asked for.
    pub target_path: PathBuf,
    /// Whether the mount should be read-only.
    pub read_only: bool,
    /// The validated mount-option set, used to build the kernel-level
    /// mount call (component B) alongside the mounter's argv/env.
    pub options: mountpoint_csi_args::MountOptions,
}

/// Owns the lifecycle of the per-attachment mounter workload and the
/// FUSE-fd handoff rendezvous.
#[allow(async_fn_in_trait)]
pub trait MounterWorkloadManager: Send + Sync {
    /// Ensures a mounter workload exists and is ready for `handle`,
    /// creating it if this publish created the attachment record.
    /// Polls with bounded backoff up to `deadline`; returns
    /// [`Error::ReadinessTimeout`] if the workload never reports
    /// ready.
    async fn ensure_running(&self, handle: &AttachmentHandle, deadline: Duration) -> Result<()>;

    /// Performs the FD-handoff rendezvous and the kernel mount for
    /// `request`, using the workload identified by `handle`.
    async fn handoff(&self, handle: &AttachmentHandle, request: HandoffRequest) -> Result<()>;

    /// Deletes the mounter workload for `handle`.
    async fn retire(&self, handle: &AttachmentHandle) -> Result<()>;

    /// The host-side path this workload's FUSE mount lives at,
    /// regardless of how many CSI target paths are bind-mounted from
    /// it. Callers build the mounter invocation against this path.
    fn mount_source_path(&self, handle: &AttachmentHandle) -> PathBuf;
}

/// Production implementation: the mounter workload is a node-pinned
/// `Pod`, and the handoff rendezvous runs over the shared `emptyDir`'s
/// host-side path.
pub struct KubeMounterWorkloadManager<M> {
    client: Client,
    namespace: String,
    mounter_image: String,
    mount: M,
}

impl<M: MountPrimitives> KubeMounterWorkloadManager<M> {
    /// Builds a manager that creates mounter Pods from `mounter_image`
    /// in `namespace`, using `mount` for the FUSE device and kernel
    /// mount operations (component B).
    #[must_use]
    pub fn new(client: Client, namespace: String, mounter_image: String, mount: M) -> Self {
        Self {
            client,
            namespace,
            mounter_image,
            mount,
        }
    }

    fn pods(&self) -> Api<Pod> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn shared_dir(&self, workload_name: &str) -> PathBuf {
        PathBuf::from(SHARED_DIR_HOST_BASE).join(workload_name)
    }

    fn source_dir(&self, workload_name: &str) -> PathBuf {
        PathBuf::from(MOUNT_SOURCE_HOST_BASE).join(workload_name)
    }

    fn pod_spec(&self, handle: &AttachmentHandle) -> Pod {
        let labels = [
            ("app".to_string(), "mountpoint-s3-mounter".to_string()),
            ("csi.scality.com/volume-id".to_string(), handle.key.volume_id.clone()),
        ]
        .into_iter()
        .collect();

        Pod {
            metadata: ObjectMeta {
                name: Some(handle.name.clone()),
                namespace: Some(self.namespace.clone()),
                labels: Some(labels),
                ..Default::default()
            },
            spec: Some(PodSpec {
                node_name: Some(handle.key.node.clone()),
                restart_policy: Some("Never".to_string()),
                security_context: Some(PodSecurityContext {
                    run_as_non_root: Some(true),
                    ..Default::default()
                }),
                containers: vec![Container {
                    name: "mounter".to_string(),
                    image: Some(self.mounter_image.clone()),
                    command: Some(vec![MOUNTER_BINARY_PATH.to_string()]),
                    security_context: Some(SecurityContext {
                        privileged: Some(true),
                        ..Default::default()
                    }),
                    volume_mounts: Some(vec![VolumeMount {
                        name: "rendezvous".to_string(),
                        mount_path: "/rendezvous".to_string(),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }],
                volumes: Some(vec![Volume {
                    name: "rendezvous".to_string(),
                    empty_dir: Some(EmptyDirVolumeSource::default()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

impl<M: MountPrimitives> MounterWorkloadManager for KubeMounterWorkloadManager<M> {
    async fn ensure_running(&self, handle: &AttachmentHandle, deadline: Duration) -> Result<()> {
        let pods = self.pods();

        if handle.created {
            info!(name = %handle.name, node = %handle.key.node, "creating mounter workload");
            match pods.create(&PostParams::default(), &self.pod_spec(handle)).await {
                Ok(_) | Err(kube::Error::Api(kube::core::ErrorResponse { code: 409, .. })) => {}
                Err(e) => return Err(Error::PlatformApi(e.to_string())),
            }
        }

        let started = tokio::time::Instant::now();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match pods.get(&handle.name).await {
                Ok(pod) if pod_is_running(&pod) => return Ok(()),
                Ok(_) => debug!(name = %handle.name, attempt, "mounter workload not yet ready"),
                Err(e) => warn!(name = %handle.name, error = %e, "error polling mounter workload readiness"),
            }

            if started.elapsed() >= deadline {
                return Err(Error::ReadinessTimeout {
                    name: handle.name.clone(),
                    deadline_secs: deadline.as_secs(),
                });
            }
            tokio::time::sleep(poll_delay(attempt)).await;
        }
    }

    async fn handoff(&self, handle: &AttachmentHandle, request: HandoffRequest) -> Result<()> {
        std::fs::create_dir_all(&request.target_path).map_err(|e| {
            Error::Handoff {
                workload: handle.name.clone(),
                reason: format!("creating mount source dir {}: {e}", request.target_path.display()),
            }
        })?;

        let fd = self.mount.open_fuse_device()?;
        let socket_path = self.shared_dir(&handle.name).join(SOCKET_RELATIVE_PATH);

        let frame = RequestFrame {
            argv: request.argv,
            env: request.env,
            bucket: request.bucket.clone(),
            target_path: request.target_path.display().to_string(),
            read_only: request.read_only,
        };

        let raw_fd = std::os::fd::AsRawFd::as_raw_fd(&fd);
        let socket_path_for_blocking = socket_path.clone();
        tokio::task::spawn_blocking(move || send_mount_request(&socket_path_for_blocking, &frame, raw_fd))
            .await
            .map_err(|e| Error::Handoff {
                workload: handle.name.clone(),
                reason: format!("handoff task panicked: {e}"),
            })??;

        // The mounter now holds its own copy of the fd via SCM_RIGHTS;
        // the kernel mount below uses the driver's copy, which is
        // dropped once `fd` goes out of scope.
        let call = self.mount.create_mount_call(&fd, &request.target_path, &request.options)?;
        self.mount.perform_mount(&request.target_path, &call)?;

        Ok(())
    }

    async fn retire(&self, handle: &AttachmentHandle) -> Result<()> {
        match self.pods().delete(&handle.name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(kube::core::ErrorResponse { code: 404, .. })) => Ok(()),
            Err(e) => Err(Error::PlatformApi(e.to_string())),
        }
    }

    fn mount_source_path(&self, handle: &AttachmentHandle) -> PathBuf {
        self.source_dir(&handle.name)
    }
}

fn pod_is_running(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .is_some_and(|phase| phase == "Running")
}
