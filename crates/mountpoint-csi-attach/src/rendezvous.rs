//! The FD-passing rendezvous protocol spoken over the Unix-domain
//! socket at `<shared-dir>/mount.sock`.
//!
//! Exactly one request/reply exchange happens per socket, carrying
//! exactly one FUSE fd out-of-band via `SCM_RIGHTS` ancillary data
//! (the `uds` crate's [`UnixStreamExt`]). The wire format is a
//! one-byte protocol version, a four-byte little-endian length, and a
//! JSON body — versioned up front so a future message shape does not
//! break old mounters.

use std::io::{Read, Write};
use std::os::fd::RawFd;
use std::os::unix::net::UnixStream;
use std::path::Path;

use serde::{Deserialize, Serialize};
use uds::UnixStreamExt;

use crate::error::{Error, Result};

/// The rendezvous protocol's wire version. Bump this, and branch on it
/// in a real mounter, before changing [`RequestFrame`]'s or
/// [`ReplyFrame`]'s shape in an incompatible way.
pub const PROTOCOL_VERSION: u8 = 1;

/// The request frame sent from the driver to the mounter workload:
/// argv, environment, bucket, target path, and the resolved read-only
/// bit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestFrame {
    /// The mounter binary's argv.
    pub argv: Vec<String>,
    /// The mounter binary's environment, as `KEY=VALUE` pairs.
    pub env: Vec<String>,
    /// The bucket being mounted.
    pub bucket: String,
    /// The target path the mount will be grafted onto.
    pub target_path: String,
    /// Whether the mount should be read-only. Carried explicitly here
    /// rather than relying solely on the kernel mount flag: a
    /// privileged FUSE daemon could otherwise defeat a kernel-only
    /// read-only flag.
    pub read_only: bool,
}

/// The reply frame sent back from the mounter workload once it has
/// accepted (or rejected) the handoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReplyFrame {
    /// The mounter is now `read()`-ing from the handed-off fd.
    Ok,
    /// The mounter rejected the request; the string is a human-readable
    /// reason, never containing secret material.
    Error(String),
}

/// Connects to `socket_path`, sends `request` along with `fuse_fd` as
/// out-of-band ancillary data, and blocks for the reply frame.
///
/// This is a blocking, synchronous operation (Unix-domain sockets and
/// `SCM_RIGHTS` have no first-class async story in the `uds` crate);
/// callers run it inside [`tokio::task::spawn_blocking`].
///
/// # Errors
///
/// Returns [`Error::Handoff`] if the socket can't be reached or the
/// wire protocol is violated, or [`Error::HandoffRejected`] if the
/// mounter's reply frame itself reports an error.
pub fn send_mount_request(socket_path: &Path, request: &RequestFrame, fuse_fd: RawFd) -> Result<()> {
    let workload = socket_path.display().to_string();
    let handoff_err = |reason: String| Error::Handoff {
        workload: workload.clone(),
        reason,
    };

    let mut stream = UnixStream::connect(socket_path).map_err(|e| handoff_err(format!("connect failed: {e}")))?;

    let body = serde_json::to_vec(request).map_err(|e| handoff_err(format!("encoding request failed: {e}")))?;
    let mut frame = Vec::with_capacity(5 + body.len());
    frame.push(PROTOCOL_VERSION);
    frame.extend_from_slice(&u32::try_from(body.len()).unwrap_or(u32::MAX).to_le_bytes());
    frame.extend_from_slice(&body);

    stream
        .send_fds(&frame, &[fuse_fd])
        .map_err(|e| handoff_err(format!("sending request frame failed: {e}")))?;

    let reply = read_reply_frame(&mut stream).map_err(|e| handoff_err(e.to_string()))?;

    match reply {
        ReplyFrame::Ok => Ok(()),
        ReplyFrame::Error(reason) => Err(Error::HandoffRejected {
            workload,
            reason,
        }),
    }
}

fn read_reply_frame(stream: &mut UnixStream) -> std::io::Result<ReplyFrame> {
    let mut version = [0u8; 1];
    stream.read_exact(&mut version)?;
    if version[0] != PROTOCOL_VERSION {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("unsupported rendezvous protocol version {}", version[0]),
        ));
    }

    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf)?;
    let len = u32::from_le_bytes(len_buf) as usize;

    let mut body = vec![0u8; len];
    stream.read_exact(&mut body)?;

    serde_json::from_slice(&body).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::AsRawFd;
    use std::os::unix::net::UnixListener;
    use std::thread;

    #[test]
    fn successful_handoff_round_trips_argv_env_and_fd() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("mount.sock");
        let listener = UnixListener::bind(&socket_path).unwrap();

        let server = thread::spawn(move || {
            let (request, fd, stream) = test_support::accept_one(&listener);
            assert_eq!(request.bucket, "my-bucket");
            assert!(fd >= 0);
            test_support::reply(stream, &ReplyFrame::Ok);
        });

        let placeholder = std::fs::File::open("/dev/null").unwrap();
        let request = RequestFrame {
            argv: vec!["my-bucket".to_string(), "/target".to_string()],
            env: vec!["AWS_ACCESS_KEY_ID=AK".to_string()],
            bucket: "my-bucket".to_string(),
            target_path: "/target".to_string(),
            read_only: false,
        };

        send_mount_request(&socket_path, &request, placeholder.as_raw_fd()).unwrap();
        server.join().unwrap();
    }

    #[test]
    fn rejected_handoff_surfaces_the_mounters_reason() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("mount.sock");
        let listener = UnixListener::bind(&socket_path).unwrap();

        let server = thread::spawn(move || {
            let (_, _, stream) = test_support::accept_one(&listener);
            test_support::reply(stream, &ReplyFrame::Error("bucket not found".to_string()));
        });

        let placeholder = std::fs::File::open("/dev/null").unwrap();
        let request = RequestFrame {
            argv: vec![],
            env: vec![],
            bucket: "missing".to_string(),
            target_path: "/target".to_string(),
            read_only: false,
        };

        let err = send_mount_request(&socket_path, &request, placeholder.as_raw_fd()).unwrap_err();
        assert!(matches!(err, Error::HandoffRejected { reason, .. } if reason == "bucket not found"));
        server.join().unwrap();
    }

    #[test]
    fn connecting_to_a_missing_socket_is_a_handoff_error() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("does-not-exist.sock");
        let placeholder = std::fs::File::open("/dev/null").unwrap();
        let request = RequestFrame {
            argv: vec![],
            env: vec![],
            bucket: "b".to_string(),
            target_path: "/t".to_string(),
            read_only: false,
        };
        let err = send_mount_request(&socket_path, &request, placeholder.as_raw_fd()).unwrap_err();
        assert!(matches!(err, Error::Handoff { .. }));
    }
}
