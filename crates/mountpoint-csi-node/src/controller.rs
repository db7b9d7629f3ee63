//! The CSI `Controller` service: dynamic
//! provisioning of buckets via `CreateVolume`/`DeleteVolume`. Everything
//! else in the `Controller` surface is either a fixed capability report
//! or `UNIMPLEMENTED` — this driver has no attach/detach step, no
//! snapshots, and no expansion.

use std::collections::HashMap;

use tonic::{Request, Response, Status};
use tracing::info;
use uuid::Uuid;

use mountpoint_csi_creds::{CredentialProvider, Operation, RawSecret, SecretSource};
use mountpoint_csi_objectstore::{ObjectStore, S3ObjectStore, StorageCredentials};
use mountpoint_csi_proto::csi::controller_server::Controller;
use mountpoint_csi_proto::csi::controller_service_capability::rpc::Type as RpcCapabilityType;
use mountpoint_csi_proto::csi::controller_service_capability::{Rpc, Type as CapabilityOneof};
use mountpoint_csi_proto::csi::volume_capability::access_mode::Mode as AccessModeKind;
use mountpoint_csi_proto::csi::{
    CapacityRange, ControllerExpandVolumeRequest, ControllerExpandVolumeResponse,
    ControllerGetCapabilitiesRequest, ControllerGetCapabilitiesResponse, ControllerGetVolumeRequest,
    ControllerGetVolumeResponse, ControllerPublishVolumeRequest, ControllerPublishVolumeResponse,
    ControllerServiceCapability, ControllerUnpublishVolumeRequest, ControllerUnpublishVolumeResponse,
    CreateSnapshotRequest, CreateSnapshotResponse, CreateVolumeRequest, CreateVolumeResponse, DeleteSnapshotRequest,
    DeleteSnapshotResponse, DeleteVolumeRequest, DeleteVolumeResponse, GetCapacityRequest, GetCapacityResponse,
    ListSnapshotsRequest, ListSnapshotsResponse, ListVolumesRequest, ListVolumesResponse,
    ValidateVolumeCapabilitiesRequest, ValidateVolumeCapabilitiesResponse, Volume, VolumeCapability,
};
use mountpoint_csi_proto::CsiError;

use crate::convert::{creds_err, store_err};

/// The default capacity reported when a `CreateVolumeRequest` carries no
/// `capacity_range`.
const DEFAULT_CAPACITY_BYTES: i64 = 1024 * 1024 * 1024;

/// Storage-class parameter naming the provisioner secret's name, in the
/// external-provisioner's standard parameter-templating convention.
const PARAM_PROVISIONER_SECRET_NAME: &str = "csi.storage.k8s.io/provisioner-secret-name";
/// See [`PARAM_PROVISIONER_SECRET_NAME`].
const PARAM_PROVISIONER_SECRET_NAMESPACE: &str = "csi.storage.k8s.io/provisioner-secret-namespace";

/// Volume-context keys this controller writes into the `Volume` it
/// returns.
const KEY_BUCKET_NAME: &str = "bucketName";
const KEY_DYNAMIC_PROVISIONING: &str = "dynamicProvisioning";
const KEY_AUTH_SOURCE: &str = "authenticationSource";

/// Builds a per-call [`ObjectStore`] client from resolved credentials.
///
/// The adapter in `mountpoint-csi-objectstore` is constructed once per
/// set of resolved credentials; this factory is the seam
/// that lets controller tests substitute an in-memory store without
/// touching the real `aws-sdk-s3` client.
pub trait ObjectStoreFactory: Send + Sync {
    /// The concrete store type this factory builds.
    type Store: ObjectStore;

    /// Builds a store for `credentials`.
    ///
    /// # Errors
    ///
    /// Returns [`mountpoint_csi_objectstore::Error`] if the client could
    /// not be configured.
    fn build(&self, credentials: &StorageCredentials) -> mountpoint_csi_objectstore::Result<Self::Store>;
}

/// Builds the real path-style `aws-sdk-s3` client.
pub struct S3StoreFactory {
    endpoint_url: String,
    default_region: String,
}

impl S3StoreFactory {
    /// Builds a factory targeting `endpoint_url`, falling back to
    /// `default_region` when resolved credentials carry no region
    /// override.
    #[must_use]
    pub fn new(endpoint_url: String, default_region: String) -> Self {
        Self { endpoint_url, default_region }
    }
}

impl ObjectStoreFactory for S3StoreFactory {
    type Store = S3ObjectStore;

    fn build(&self, credentials: &StorageCredentials) -> mountpoint_csi_objectstore::Result<Self::Store> {
        S3ObjectStore::new(&self.endpoint_url, &self.default_region, credentials)
    }
}

/// True for access modes usable by more than one node at once; object
/// storage is intrinsically multi-node, so single-node modes are
/// rejected.
fn is_multi_node(mode: AccessModeKind) -> bool {
    matches!(
        mode,
        AccessModeKind::MultiNodeReaderOnly | AccessModeKind::MultiNodeSingleWriter | AccessModeKind::MultiNodeMultiWriter
    )
}

fn validate_capabilities(capabilities: &[VolumeCapability]) -> Result<(), Status> {
    if capabilities.is_empty() {
        return Err(Status::invalid_argument("volume_capabilities must not be empty"));
    }
    for capability in capabilities {
        let mode = capability
            .access_mode
            .as_ref()
            .and_then(|m| AccessModeKind::try_from(m.mode).ok())
            .unwrap_or(AccessModeKind::Unknown);
        if !is_multi_node(mode) {
            return Err(Status::invalid_argument(format!(
                "access mode {mode:?} is single-node; object storage volumes only support multi-node access modes"
            )));
        }
    }
    Ok(())
}

/// Reads `access_key_id`/`secret_access_key`/`session_token`/`region`
/// straight off a CSI request's `secrets` map.
fn raw_secret_from_map(secrets: &HashMap<String, String>) -> Option<RawSecret> {
    if secrets.is_empty() {
        return None;
    }
    Some(RawSecret {
        access_key_id: secrets.get("access_key_id").cloned(),
        secret_access_key: secrets.get("secret_access_key").cloned(),
        session_token: secrets.get("session_token").cloned(),
        region: secrets.get("region").cloned(),
    })
}

fn provisioner_secret_ref(parameters: &HashMap<String, String>) -> Option<(String, String)> {
    let name = parameters.get(PARAM_PROVISIONER_SECRET_NAME)?;
    let namespace = parameters.get(PARAM_PROVISIONER_SECRET_NAMESPACE)?;
    if name.is_empty() || namespace.is_empty() {
        return None;
    }
    Some((namespace.clone(), name.clone()))
}

/// The controller plugin: provisions and deprovisions buckets. Holds no
/// cluster-scoped state of its own — bucket existence in the backing
/// object store *is* the state.
pub struct ControllerService<F, S> {
    factory: F,
    credentials: CredentialProvider<S>,
}

impl<F, S> ControllerService<F, S>
where
    F: ObjectStoreFactory,
    S: SecretSource,
{
    /// Builds a controller service backed by `factory` for object-store
    /// access and `credentials` for credential resolution.
    #[must_use]
    pub fn new(factory: F, credentials: CredentialProvider<S>) -> Self {
        Self { factory, credentials }
    }
}

#[tonic::async_trait]
impl<F, S> Controller for ControllerService<F, S>
where
    F: ObjectStoreFactory + 'static,
    S: SecretSource + 'static,
{
    async fn create_volume(
        &self,
        request: Request<CreateVolumeRequest>,
    ) -> Result<Response<CreateVolumeResponse>, Status> {
        let req = request.into_inner();
        if req.name.is_empty() {
            return Err(Status::invalid_argument("name is required"));
        }
        validate_capabilities(&req.volume_capabilities)?;

        let volume_id = Uuid::new_v4().to_string();
        let request_secret = raw_secret_from_map(&req.secrets);
        let used_request_secret = request_secret.is_some();
        let resolved = self
            .credentials
            .resolve(Operation::ControllerVolume {
                request_secret,
                provisioner_secret_ref: provisioner_secret_ref(&req.parameters),
            })
            .await
            .map_err(creds_err)?;

        let store = self.factory.build(&resolved.storage).map_err(store_err)?;
        store.create_bucket(&volume_id).await.map_err(store_err)?;
        info!(volume_id = %volume_id, name = %req.name, "volume created");

        let capacity_bytes = req
            .capacity_range
            .as_ref()
            .map(|r| if r.required_bytes > 0 { r.required_bytes } else { DEFAULT_CAPACITY_BYTES })
            .unwrap_or(DEFAULT_CAPACITY_BYTES);

        let mut volume_context = HashMap::new();
        volume_context.insert(KEY_BUCKET_NAME.to_string(), volume_id.clone());
        volume_context.insert(KEY_DYNAMIC_PROVISIONING.to_string(), "true".to_string());
        volume_context.insert(
            KEY_AUTH_SOURCE.to_string(),
            if used_request_secret { "secret".to_string() } else { "driver".to_string() },
        );

        Ok(Response::new(CreateVolumeResponse {
            volume: Some(Volume { capacity_bytes, volume_id, volume_context }),
        }))
    }

    async fn delete_volume(
        &self,
        request: Request<DeleteVolumeRequest>,
    ) -> Result<Response<DeleteVolumeResponse>, Status> {
        let req = request.into_inner();
        if req.volume_id.is_empty() {
            return Err(Status::invalid_argument("volume_id is required"));
        }

        // Driver credentials only: per-volume secrets are not available
        // at this RPC.
        let resolved = self
            .credentials
            .resolve(Operation::ControllerVolume { request_secret: None, provisioner_secret_ref: None })
            .await
            .map_err(creds_err)?;
        let store = self.factory.build(&resolved.storage).map_err(store_err)?;

        // Idempotent: absent bucket and non-empty bucket are both
        // success.
        store.delete_bucket(&req.volume_id).await.map_err(store_err)?;
        info!(volume_id = %req.volume_id, "delete_volume completed (bucket removed if empty, preserved if not)");

        Ok(Response::new(DeleteVolumeResponse {}))
    }

    async fn controller_publish_volume(
        &self,
        _request: Request<ControllerPublishVolumeRequest>,
    ) -> Result<Response<ControllerPublishVolumeResponse>, Status> {
        Err(Status::unimplemented("ControllerPublishVolume is not supported"))
    }

    async fn controller_unpublish_volume(
        &self,
        _request: Request<ControllerUnpublishVolumeRequest>,
    ) -> Result<Response<ControllerUnpublishVolumeResponse>, Status> {
        Err(Status::unimplemented("ControllerUnpublishVolume is not supported"))
    }

    async fn validate_volume_capabilities(
        &self,
        request: Request<ValidateVolumeCapabilitiesRequest>,
    ) -> Result<Response<ValidateVolumeCapabilitiesResponse>, Status> {
        let req = request.into_inner();
        if req.volume_id.is_empty() {
            return Err(Status::invalid_argument("volume_id is required"));
        }
        match validate_capabilities(&req.volume_capabilities) {
            Ok(()) => Ok(Response::new(ValidateVolumeCapabilitiesResponse {
                confirmed: Some(mountpoint_csi_proto::csi::validate_volume_capabilities_response::Confirmed {
                    volume_context: req.volume_context,
                    volume_capabilities: req.volume_capabilities,
                }),
                message: String::new(),
            })),
            Err(status) => Ok(Response::new(ValidateVolumeCapabilitiesResponse {
                confirmed: None,
                message: status.message().to_string(),
            })),
        }
    }

    async fn list_volumes(
        &self,
        _request: Request<ListVolumesRequest>,
    ) -> Result<Response<ListVolumesResponse>, Status> {
        Err(Status::unimplemented("ListVolumes is not supported"))
    }

    async fn get_capacity(
        &self,
        _request: Request<GetCapacityRequest>,
    ) -> Result<Response<GetCapacityResponse>, Status> {
        Err(Status::unimplemented("GetCapacity is not supported"))
    }

    async fn controller_get_capabilities(
        &self,
        _request: Request<ControllerGetCapabilitiesRequest>,
    ) -> Result<Response<ControllerGetCapabilitiesResponse>, Status> {
        Ok(Response::new(ControllerGetCapabilitiesResponse {
            capabilities: vec![ControllerServiceCapability {
                r#type: Some(CapabilityOneof::Rpc(Rpc { r#type: RpcCapabilityType::CreateDeleteVolume as i32 })),
            }],
        }))
    }

    async fn create_snapshot(
        &self,
        _request: Request<CreateSnapshotRequest>,
    ) -> Result<Response<CreateSnapshotResponse>, Status> {
        Err(Status::unimplemented("CreateSnapshot is not supported"))
    }

    async fn delete_snapshot(
        &self,
        _request: Request<DeleteSnapshotRequest>,
    ) -> Result<Response<DeleteSnapshotResponse>, Status> {
        Err(Status::unimplemented("DeleteSnapshot is not supported"))
    }

    async fn list_snapshots(
        &self,
        _request: Request<ListSnapshotsRequest>,
    ) -> Result<Response<ListSnapshotsResponse>, Status> {
        Err(Status::unimplemented("ListSnapshots is not supported"))
    }

    async fn controller_expand_volume(
        &self,
        _request: Request<ControllerExpandVolumeRequest>,
    ) -> Result<Response<ControllerExpandVolumeResponse>, Status> {
        Err(Status::unimplemented("ControllerExpandVolume is not supported"))
    }

    async fn controller_get_volume(
        &self,
        _request: Request<ControllerGetVolumeRequest>,
    ) -> Result<Response<ControllerGetVolumeResponse>, Status> {
        Err(Status::unimplemented("ControllerGetVolume is not supported"))
    }
}
