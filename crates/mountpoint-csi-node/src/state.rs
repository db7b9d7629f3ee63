//! Local publish-state persistence.
//!
//! `NodeUnpublishVolumeRequest` carries only `volume_id` and
//! `target_path` — no volume context, no secrets — so the sharing key
//! and consumer reference a publish built are not reconstructible from
//! the unpublish request alone. This module closes that gap with a
//! JSON-file-backed map from target path to the facts `NodePublishVolume`
//! resolved: load the whole map into memory once, snapshot it to disk
//! on every write.
//!
//! This is node-local, process-private bookkeeping, not durable cluster
//! state — the attachment record in `mountpoint-csi-attach` remains the
//! only state a cluster operator needs to reason about.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Everything `NodeUnpublishVolume` needs to rebuild the sharing key and
/// consumer reference a prior `NodePublishVolume` call established.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublishRecord {
    /// The published volume's id.
    pub volume_id: String,
    /// The node the publish happened on.
    pub node: String,
    /// Hex-encoded credentials fingerprint, as produced by
    /// `mountpoint_csi_creds::CredentialsFingerprint::to_hex`.
    pub fingerprint_hex: String,
    /// The fsGroup read from the publish request's volume context, if
    /// any.
    pub fs_group: Option<String>,
    /// The consuming Pod's name.
    pub pod_name: String,
    /// The consuming Pod's stable UID.
    pub pod_uid: String,
}

/// A JSON file-backed map from target path to [`PublishRecord`].
pub struct PublishState {
    path: PathBuf,
    records: Mutex<HashMap<String, PublishRecord>>,
}

impl PublishState {
    /// Opens the state file at `path`, loading any existing records.
    /// A missing or corrupt file starts empty rather than failing —
    /// losing this bookkeeping only means a future unpublish for that
    /// target cannot resolve its key, not that the driver cannot start.
    #[must_use]
    pub fn open(path: &Path) -> Self {
        let records = match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "corrupt publish state file, starting fresh");
                HashMap::new()
            }),
            Err(_) => {
                debug!(path = %path.display(), "no publish state file, starting fresh");
                HashMap::new()
            }
        };
        Self {
            path: path.to_path_buf(),
            records: Mutex::new(records),
        }
    }

    /// Records `record` under `target_path`, overwriting any existing
    /// entry (a retried publish for the same target overwrites its own
    /// prior attempt).
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the snapshot could not be written.
    pub fn insert(&self, target_path: &str, record: PublishRecord) -> std::io::Result<()> {
        {
            let mut records = self.records.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            records.insert(target_path.to_string(), record);
        }
        self.snapshot()
    }

    /// Looks up the record for `target_path`, if any.
    #[must_use]
    pub fn get(&self, target_path: &str) -> Option<PublishRecord> {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(target_path)
            .cloned()
    }

    /// Removes and returns the record for `target_path`, if any.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the snapshot could not be written.
    pub fn remove(&self, target_path: &str) -> std::io::Result<Option<PublishRecord>> {
        let removed = {
            let mut records = self.records.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            records.remove(target_path)
        };
        if removed.is_some() {
            self.snapshot()?;
        }
        Ok(removed)
    }

    fn snapshot(&self) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let records = self.records.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let content = serde_json::to_string_pretty(&*records)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(&self.path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(volume_id: &str) -> PublishRecord {
        PublishRecord {
            volume_id: volume_id.to_string(),
            node: "node-a".to_string(),
            fingerprint_hex: "a".repeat(64),
            fs_group: Some("1000".to_string()),
            pod_name: "app-pod".to_string(),
            pod_uid: "uid-1".to_string(),
        }
    }

    #[test]
    fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let state = PublishState::open(&dir.path().join("state.json"));
        assert!(state.get("/target").is_none());
    }

    #[test]
    fn insert_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let state = PublishState::open(&dir.path().join("state.json"));
        state.insert("/target/a", record("vol-1")).unwrap();
        assert_eq!(state.get("/target/a"), Some(record("vol-1")));
    }

    #[test]
    fn remove_deletes_the_entry() {
        let dir = tempfile::tempdir().unwrap();
        let state = PublishState::open(&dir.path().join("state.json"));
        state.insert("/target/a", record("vol-1")).unwrap();
        let removed = state.remove("/target/a").unwrap();
        assert_eq!(removed, Some(record("vol-1")));
        assert!(state.get("/target/a").is_none());
    }

    #[test]
    fn remove_of_absent_entry_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let state = PublishState::open(&dir.path().join("state.json"));
        assert_eq!(state.remove("/target/missing").unwrap(), None);
    }

    #[test]
    fn state_survives_a_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        {
            let state = PublishState::open(&path);
            state.insert("/target/a", record("vol-1")).unwrap();
        }
        let reloaded = PublishState::open(&path);
        assert_eq!(reloaded.get("/target/a"), Some(record("vol-1")));
    }
}
