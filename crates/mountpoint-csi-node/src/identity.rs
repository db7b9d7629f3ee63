//! The CSI `Identity` service: plugin name/version and a liveness probe
//!. Stateless and identical between the
//! node and controller binaries.

use tonic::{Request, Response, Status};

use mountpoint_csi_proto::csi::identity_server::Identity;
use mountpoint_csi_proto::csi::plugin_capability::service::Type as ServiceCapabilityType;
use mountpoint_csi_proto::csi::plugin_capability::{Service, Type as PluginCapabilityOneof};
use mountpoint_csi_proto::csi::{
    GetPluginCapabilitiesRequest, GetPluginCapabilitiesResponse, GetPluginInfoRequest, GetPluginInfoResponse,
    PluginCapability, ProbeRequest, ProbeResponse,
};

/// The plugin name reported to sidecars and `kubectl get csidrivers`.
pub const PLUGIN_NAME: &str = "s3.csi.scality.com";

/// Identity service implementation shared by the node and controller
/// binaries.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityService;

impl IdentityService {
    /// Builds a new identity service.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[tonic::async_trait]
impl Identity for IdentityService {
    async fn get_plugin_info(
        &self,
        _request: Request<GetPluginInfoRequest>,
    ) -> Result<Response<GetPluginInfoResponse>, Status> {
        Ok(Response::new(GetPluginInfoResponse {
            name: PLUGIN_NAME.to_string(),
            vendor_version: env!("CARGO_PKG_VERSION").to_string(),
            manifest: Default::default(),
        }))
    }

    async fn get_plugin_capabilities(
        &self,
        _request: Request<GetPluginCapabilitiesRequest>,
    ) -> Result<Response<GetPluginCapabilitiesResponse>, Status> {
        Ok(Response::new(GetPluginCapabilitiesResponse {
            capabilities: vec![PluginCapability {
                r#type: Some(PluginCapabilityOneof::Service(Service {
                    r#type: ServiceCapabilityType::ControllerService as i32,
                })),
            }],
        }))
    }

    async fn probe(&self, _request: Request<ProbeRequest>) -> Result<Response<ProbeResponse>, Status> {
        Ok(Response::new(ProbeResponse { ready: true }))
    }
}
