//! Per-target concurrency control:
//! serializes publish/unpublish calls that share a `(volume_id,
//! target_path)` pair while letting unrelated calls proceed in
//! parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// A striped lock keyed by `(volume_id, target_path)`.
///
/// Holds one [`tokio::sync::Mutex`] per key, created on first use and
/// never removed: the number of distinct `(volume_id, target_path)`
/// pairs a node ever sees is bounded by the number of volumes it has
/// ever published, which is small enough that leaking the map entries
/// for the life of the process is acceptable.
#[derive(Default)]
pub struct PublishLocks {
    stripes: Mutex<HashMap<(String, String), Arc<AsyncMutex<()>>>>,
}

impl PublishLocks {
    /// Builds an empty set of stripes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the stripe for `(volume_id, target_path)`, waiting for
    /// any concurrent call against the same pair to finish first.
    pub async fn lock(&self, volume_id: &str, target_path: &str) -> OwnedMutexGuard<()> {
        let stripe = {
            let mut stripes = self
                .stripes
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            stripes
                .entry((volume_id.to_string(), target_path.to_string()))
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        stripe.lock_owned().await
    }
}
