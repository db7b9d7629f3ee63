//! Generated CSI v1 gRPC types and the error taxonomy shared across the
//! mountpoint-s3 CSI driver's crates.
//!
//! The `csi` module is produced at build time by `tonic-build` from
//! `proto/csi.proto`, a trimmed copy of the upstream
//! `container-storage-interface/spec` wire format covering the RPCs this
//! driver implements. Nothing in this crate hand-maintains message shapes;
//! it only adds the error conversions the rest of the workspace needs at the
//! gRPC boundary.

#![warn(missing_docs)]

pub mod error;

/// Generated CSI protobuf types (`Identity`, `Controller`, `Node` services
/// and their request/response messages).
pub mod csi {
    tonic::include_proto!("csi.v1");
}

pub use error::CsiError;
