//! Volume-context parsing (component E) and mount-option argument
//! building (component C) for the mountpoint-s3 CSI driver.
//!
//! Both components are pure, small, and exercised by the same
//! round-trip/property tests, so they share this crate.

#![warn(missing_docs)]

pub mod context;
pub mod error;
pub mod invocation;
pub mod options;

pub use context::{parse_volume_context, AuthenticationSource, SecretReference, VolumeContext};
pub use error::{Error, Result};
pub use invocation::{build_invocation, MounterCredentials, MounterInvocation};
pub use options::MountOptions;
