//! Door entity façade.
//!
//! A [`DoorEntity`] is the consumer-facing view of one attached device:
//! state reads come from the shared cache, commands go to the remote
//! device, and every command is followed by a best-effort refresh so the
//! cache converges without waiting for the next poll cycle.

use crate::cache::StatusCache;
use crate::error::Result;
use crate::rotation::RotationWatcher;
use doorlink_client::{AnyDoorClient, AnyDoorDevice, DoorClient, DoorDevice};
use doorlink_core::constants::REMOTE_CALL_TIMEOUT_SECS;
use doorlink_core::{Device, DeviceId, DeviceStatus, DoorState};
use doorlink_store::CredentialRepository;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

/// Consumer-facing view of one garage door.
///
/// Reads never touch the network; they are snapshots of the shared cache.
/// Commands are time-bounded remote calls followed by a refresh and a
/// rotation observation.
#[derive(Debug, Clone)]
pub struct DoorEntity<R> {
    metadata: Device,
    device: AnyDoorDevice,
    client: AnyDoorClient,
    cache: StatusCache,
    watcher: Arc<RotationWatcher<R>>,
}

impl<R: CredentialRepository> DoorEntity<R> {
    pub(crate) fn new(
        device: AnyDoorDevice,
        client: AnyDoorClient,
        cache: StatusCache,
        watcher: Arc<RotationWatcher<R>>,
    ) -> Self {
        Self {
            metadata: device.metadata().clone(),
            device,
            client,
            cache,
            watcher,
        }
    }

    /// Stable device identifier.
    #[must_use]
    pub fn device_id(&self) -> &DeviceId {
        &self.metadata.device_id
    }

    /// Human-readable device name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Device metadata discovered at listing time.
    #[must_use]
    pub fn metadata(&self) -> &Device {
        &self.metadata
    }

    /// Current door state from the cache.
    pub async fn state(&self) -> DoorState {
        self.cached().await.door_state
    }

    /// Whether the door is closed.
    ///
    /// Returns `None` when the state is unknown so a consumer can render
    /// "unknown" instead of guessing. Anything other than fully open
    /// counts as closed, matching how the vendor reports door security.
    pub async fn is_closed(&self) -> Option<bool> {
        match self.cached().await.door_state {
            DoorState::Unknown => None,
            state => Some(state != DoorState::Open),
        }
    }

    /// Whether the device is reachable according to the vendor cloud.
    ///
    /// `None` means the remote never said either way.
    pub async fn available(&self) -> Option<bool> {
        self.cached().await.online
    }

    /// Diagnostic attributes for display alongside the state.
    pub async fn extra_attributes(&self) -> Map<String, Value> {
        let status = self.cached().await;
        let mut attrs = Map::new();

        if let Some(low) = status.low_battery {
            attrs.insert("low_battery".to_string(), Value::Bool(low));
        }
        if let Some(critical) = status.battery_critical {
            attrs.insert("battery_critical".to_string(), Value::Bool(critical));
        }
        if let Some(ts) = status.last_update {
            attrs.insert(
                "last_update".to_string(),
                Value::String(ts.to_rfc3339()),
            );
        }
        if let Some(serial) = &self.metadata.serial_number {
            attrs.insert("serial_number".to_string(), Value::String(serial.clone()));
        }

        attrs
    }

    /// Command the door open.
    ///
    /// # Errors
    ///
    /// Returns an error if the command is rejected, fails in transit, or
    /// exceeds the remote call bound. The follow-up refresh never errors;
    /// its failure only degrades the cached snapshot.
    pub async fn open(&self) -> Result<()> {
        self.bounded(self.device.open()).await?;
        self.after_command().await;
        Ok(())
    }

    /// Command the door closed.
    ///
    /// # Errors
    ///
    /// Returns an error if the command is rejected, fails in transit, or
    /// exceeds the remote call bound.
    pub async fn close(&self) -> Result<()> {
        self.bounded(self.device.close()).await?;
        self.after_command().await;
        Ok(())
    }

    /// Read the device now and update the cache.
    ///
    /// Failure degrades the snapshot to [`DeviceStatus::unknown`], the
    /// same way a failed poll cycle does.
    pub async fn refresh(&self) {
        let outcome = self
            .bounded(self.device.status())
            .await;

        match outcome {
            Ok(status) => {
                self.cache.put(self.device_id().clone(), status).await;
            }
            Err(e) => {
                warn!(device_id = %self.device_id(), error = %e, "refresh failed");
                self.cache
                    .put(self.device_id().clone(), DeviceStatus::unknown())
                    .await;
            }
        }

        self.watcher.observe(&self.client.session_handle()).await;
    }

    async fn after_command(&self) {
        self.watcher.observe(&self.client.session_handle()).await;
        self.refresh().await;
    }

    async fn cached(&self) -> DeviceStatus {
        self.cache
            .get(self.device_id())
            .await
            .unwrap_or_else(DeviceStatus::unknown)
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = doorlink_client::Result<T>>,
    ) -> Result<T> {
        match timeout(Duration::from_secs(REMOTE_CALL_TIMEOUT_SECS), call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(doorlink_client::ClientError::timeout(
                REMOTE_CALL_TIMEOUT_SECS * 1000,
            )
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doorlink_client::mock::MockDoorClient;
    use doorlink_client::{AnyDoorClient, Capabilities};
    use doorlink_store::{Database, SqliteCredentialRepository};

    async fn entity_fixture(
        caps: Capabilities,
    ) -> (
        DoorEntity<SqliteCredentialRepository>,
        doorlink_client::mock::MockDeviceHandle,
        StatusCache,
    ) {
        let db = Database::in_memory().await.unwrap();
        let repo = SqliteCredentialRepository::new(db.pool().clone());

        let (client, account) = MockDoorClient::new("acct-1", "tok-A");
        let meta = Device::new(
            DeviceId::new("GD-1").unwrap(),
            "Main Garage",
            "Chamberlain",
            "WGDO-1",
        )
        .with_serial_number("SN0001");
        let handle = account.add_device(meta, caps);

        let client = AnyDoorClient::Mock(client);
        let device = client.device(&DeviceId::new("GD-1").unwrap()).unwrap();

        let cache = StatusCache::new();
        let watcher = Arc::new(RotationWatcher::new("acct-1", "tok-A", repo));
        let entity = DoorEntity::new(device, client, cache.clone(), watcher);

        (entity, handle, cache)
    }

    fn status(state: DoorState) -> DeviceStatus {
        DeviceStatus {
            door_state: state,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_unknown_state_reads_as_none() {
        let (entity, _handle, _cache) = entity_fixture(Capabilities::all()).await;

        assert_eq!(entity.state().await, DoorState::Unknown);
        assert_eq!(entity.is_closed().await, None);
        assert_eq!(entity.available().await, None);
    }

    #[tokio::test]
    async fn test_is_closed_semantics() {
        let (entity, _handle, cache) = entity_fixture(Capabilities::all()).await;
        let id = entity.device_id().clone();

        cache.put(id.clone(), status(DoorState::Closed)).await;
        assert_eq!(entity.is_closed().await, Some(true));

        cache.put(id.clone(), status(DoorState::Open)).await;
        assert_eq!(entity.is_closed().await, Some(false));

        // Transitional states count as not fully open.
        cache.put(id.clone(), status(DoorState::Opening)).await;
        assert_eq!(entity.is_closed().await, Some(true));

        cache.put(id, status(DoorState::Closing)).await;
        assert_eq!(entity.is_closed().await, Some(true));
    }

    #[tokio::test]
    async fn test_open_commands_device_and_refreshes() {
        let (entity, handle, _cache) = entity_fixture(Capabilities::all()).await;

        handle.set_current_status(DeviceStatus {
            door_state: DoorState::Opening,
            online: Some(true),
            ..Default::default()
        });

        entity.open().await.unwrap();
        assert_eq!(handle.open_calls(), 1);
        // The post-command refresh landed in the cache.
        assert_eq!(entity.state().await, DoorState::Opening);
        assert_eq!(entity.available().await, Some(true));
    }

    #[tokio::test]
    async fn test_failed_command_propagates() {
        let (entity, handle, _cache) = entity_fixture(Capabilities::all()).await;
        handle.fail_commands(true);

        assert!(entity.close().await.is_err());
        assert_eq!(handle.close_calls(), 0);
    }

    #[tokio::test]
    async fn test_refresh_failure_degrades_to_unknown() {
        let (entity, handle, cache) = entity_fixture(Capabilities::all()).await;
        let id = entity.device_id().clone();

        cache.put(id.clone(), status(DoorState::Closed)).await;
        handle.queue_status_failure(doorlink_client::ClientError::communication(
            "gateway offline",
        ));

        entity.refresh().await;
        assert_eq!(entity.state().await, DoorState::Unknown);
        assert_eq!(entity.is_closed().await, None);
    }

    #[tokio::test]
    async fn test_extra_attributes() {
        let (entity, _handle, cache) = entity_fixture(Capabilities::all()).await;

        cache
            .put(
                entity.device_id().clone(),
                DeviceStatus {
                    door_state: DoorState::Closed,
                    low_battery: Some(false),
                    battery_critical: Some(false),
                    ..Default::default()
                },
            )
            .await;

        let attrs = entity.extra_attributes().await;
        assert_eq!(attrs.get("low_battery"), Some(&Value::Bool(false)));
        assert_eq!(
            attrs.get("serial_number"),
            Some(&Value::String("SN0001".to_string()))
        );
        assert!(!attrs.contains_key("last_update"));
    }
}
