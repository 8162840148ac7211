//! Shared status cache with timestamp-ordered writes.
//!
//! The cache is the single point both update paths converge on: the poll
//! scheduler and the push reconciliation loop write through [`StatusCache::put`],
//! and entity reads come straight out of it. The ordering rule lives in
//! [`DeviceStatus::supersedes`]; the cache only enforces it.

use doorlink_core::{DeviceId, DeviceStatus};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Outcome of a cache write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// The snapshot replaced the stored one.
    Stored,

    /// The snapshot was strictly older than the stored one and was dropped.
    Discarded,
}

/// Per-account device status cache.
///
/// Cloneable; all clones share the same map. Writers race benignly: the
/// ordering check and the write happen under one write lock, so a late
/// push can never overwrite a newer poll result.
#[derive(Debug, Clone, Default)]
pub struct StatusCache {
    inner: Arc<RwLock<HashMap<DeviceId, DeviceStatus>>>,
}

impl StatusCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the stored status for a device.
    pub async fn get(&self, device_id: &DeviceId) -> Option<DeviceStatus> {
        self.inner.read().await.get(device_id).cloned()
    }

    /// Write a snapshot, subject to the ordering rule.
    ///
    /// The first write for a device always lands. After that, an incoming
    /// snapshot is discarded only when both it and the stored one carry
    /// timestamps and the incoming one is strictly older.
    pub async fn put(&self, device_id: DeviceId, status: DeviceStatus) -> PutOutcome {
        let mut map = self.inner.write().await;

        match map.get(&device_id) {
            Some(stored) if !status.supersedes(stored) => {
                debug!(
                    device_id = %device_id,
                    incoming = ?status.last_update,
                    stored = ?stored.last_update,
                    "discarding stale status update"
                );
                PutOutcome::Discarded
            }
            _ => {
                map.insert(device_id, status);
                PutOutcome::Stored
            }
        }
    }

    /// Remove a device entry, returning the stored snapshot if any.
    pub async fn remove(&self, device_id: &DeviceId) -> Option<DeviceStatus> {
        self.inner.write().await.remove(device_id)
    }

    /// Number of devices with a cached snapshot.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Returns `true` if no device has a cached snapshot.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
