//! Enum wrappers for remote client dispatch.
//!
//! Native `async fn` in traits (RPITIT, Edition 2024) are not object-safe,
//! so `Box<dyn DoorClient>` is not an option. These enums provide concrete
//! type dispatch at compile time instead: zero-cost, type-safe, and open to
//! new vendor backends as additional variants.

use crate::error::Result;
use crate::mock::{MockClientFactory, MockDoorClient, MockDoorDevice};
use crate::traits::{
    Capabilities, ClientCredentials, ClientFactory, DoorClient, DoorDevice,
};
use doorlink_core::{Device, DeviceId, DeviceStatus, SessionHandle};
use tokio::sync::mpsc;

/// Enum wrapper for account client dispatch.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum AnyDoorClient {
    /// Mock account client for development and testing.
    Mock(MockDoorClient),
}

impl DoorClient for AnyDoorClient {
    fn account_id(&self) -> &str {
        match self {
            Self::Mock(client) => client.account_id(),
        }
    }

    async fn list_devices(&self) -> Result<Vec<Device>> {
        match self {
            Self::Mock(client) => client.list_devices().await,
        }
    }

    fn session_handle(&self) -> SessionHandle {
        match self {
            Self::Mock(client) => client.session_handle(),
        }
    }

    fn device(&self, device_id: &DeviceId) -> Option<AnyDoorDevice> {
        match self {
            Self::Mock(client) => client.device(device_id),
        }
    }
}

/// Enum wrapper for per-device dispatch.
///
/// Cloneable: a device is a view onto the shared account session, and the
/// scheduler, entity façade, and detach path each hold their own clone.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum AnyDoorDevice {
    /// Mock device for development and testing.
    Mock(MockDoorDevice),
}

impl DoorDevice for AnyDoorDevice {
    fn metadata(&self) -> &Device {
        match self {
            Self::Mock(device) => device.metadata(),
        }
    }

    fn capabilities(&self) -> Capabilities {
        match self {
            Self::Mock(device) => device.capabilities(),
        }
    }

    async fn status(&self) -> Result<DeviceStatus> {
        match self {
            Self::Mock(device) => device.status().await,
        }
    }

    async fn open(&self) -> Result<()> {
        match self {
            Self::Mock(device) => device.open().await,
        }
    }

    async fn close(&self) -> Result<()> {
        match self {
            Self::Mock(device) => device.close().await,
        }
    }

    async fn subscribe(&self, tx: mpsc::Sender<DeviceStatus>) -> Result<()> {
        match self {
            Self::Mock(device) => device.subscribe(tx).await,
        }
    }

    async fn unsubscribe(&self) -> Result<()> {
        match self {
            Self::Mock(device) => device.unsubscribe().await,
        }
    }
}

/// Enum wrapper for client factory dispatch.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum AnyClientFactory {
    /// Mock factory for development and testing.
    Mock(MockClientFactory),
}

impl ClientFactory for AnyClientFactory {
    async fn create(&self, credentials: &ClientCredentials) -> Result<AnyDoorClient> {
        match self {
            Self::Mock(factory) => factory.create(credentials).await,
        }
    }
}
