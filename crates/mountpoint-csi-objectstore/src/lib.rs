//! Object-storage adapter.
//!
//! A four-operation wrapper around the object-storage HTTP API:
//! `create_bucket`, `delete_bucket`, `head_bucket`, `list_buckets`. Used
//! only by the controller service's dynamic-provisioning path; by contract
//! the volume id is also the bucket name for dynamically provisioned
//! volumes, so no additional name mapping is stored anywhere.
//!
//! Path-style requests only — no virtual-host routing — because endpoints
//! are user-configured and may not support virtual-host addressing.

#![warn(missing_docs)]

pub mod client;
pub mod error;

pub use client::{ObjectStore, S3ObjectStore, StorageCredentials};
pub use error::{Error, Result};
