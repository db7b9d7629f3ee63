//! Attachment coordinator and mounter-workload manager: the pieces
//! that decide whether a publish shares an existing mounter workload
//! or spins up a new one, and that hand a FUSE file descriptor across
//! the process boundary to it.

#![warn(missing_docs)]

pub mod coordinator;
pub mod error;
pub mod key;
pub mod record;
pub mod workload;

#[cfg(target_os = "linux")]
mod rendezvous;
#[cfg(not(target_os = "linux"))]
#[path = "rendezvous_other.rs"]
mod rendezvous;

pub use coordinator::{AttachmentCoordinator, AttachmentHandle, KubeAttachmentCoordinator, ReleaseOutcome};
pub use error::{Error, Result};
pub use key::AttachmentKey;
pub use record::{
    consumer_owner_reference, ConsumerRef, MounterAttachment, MounterAttachmentSpec, MounterAttachmentStatus,
    WorkloadPhase,
};
pub use rendezvous::{ReplyFrame, RequestFrame, PROTOCOL_VERSION};
pub use workload::{HandoffRequest, KubeMounterWorkloadManager, MounterWorkloadManager, DEFAULT_READY_DEADLINE};
