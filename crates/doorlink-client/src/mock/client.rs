//! Mock account client and factory.

use crate::devices::{AnyDoorClient, AnyDoorDevice};
use crate::error::{ClientError, Result};
use crate::mock::device::{MockDeviceHandle, MockDoorDevice};
use crate::traits::{Capabilities, ClientCredentials, ClientFactory, DoorClient, DoorDevice};
use doorlink_core::{Device, DeviceId, SessionHandle};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Mock account client for testing and development.
///
/// Simulates one authenticated vendor account session: a device listing,
/// the shared opaque session handle, and the per-device operation surface.
/// Cloneable; every clone shares the same session state, matching how the
/// real SDK shares one session object across devices.
///
/// # Examples
///
/// ```
/// use doorlink_client::mock::MockDoorClient;
/// use doorlink_client::{Capabilities, DoorClient};
/// use doorlink_core::{Device, DeviceId};
///
/// #[tokio::main]
/// async fn main() -> doorlink_client::Result<()> {
///     let (client, account) = MockDoorClient::new("acct-1", "tok-A");
///
///     let meta = Device::new(
///         DeviceId::new("GD-1").unwrap(),
///         "Main Garage",
///         "Chamberlain",
///         "WGDO-1",
///     );
///     account.add_device(meta, Capabilities::all());
///
///     let devices = client.list_devices().await?;
///     assert_eq!(devices.len(), 1);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MockDoorClient {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    account_id: String,
    devices: Mutex<Vec<MockDoorDevice>>,
    handle: Mutex<SessionHandle>,
    fail_list: AtomicBool,
    list_calls: AtomicUsize,
}

impl MockDoorClient {
    /// Create a mock account session.
    ///
    /// The session handle is seeded with the given refresh token under the
    /// `refresh_token` key, the way the real client embeds the token it
    /// authenticated with.
    pub fn new(
        account_id: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> (Self, MockAccountHandle) {
        let mut handle = SessionHandle::new();
        handle.insert("refresh_token", refresh_token);

        let inner = Arc::new(ClientInner {
            account_id: account_id.into(),
            devices: Mutex::new(Vec::new()),
            handle: Mutex::new(handle),
            fail_list: AtomicBool::new(false),
            list_calls: AtomicUsize::new(0),
        });

        let client = Self {
            inner: Arc::clone(&inner),
        };
        let account = MockAccountHandle { inner };

        (client, account)
    }
}

impl DoorClient for MockDoorClient {
    fn account_id(&self) -> &str {
        &self.inner.account_id
    }

    async fn list_devices(&self) -> Result<Vec<Device>> {
        self.inner.list_calls.fetch_add(1, Ordering::SeqCst);

        if self.inner.fail_list.load(Ordering::SeqCst) {
            return Err(ClientError::communication("device listing failed"));
        }

        let devices = self.inner.devices.lock().expect("devices lock");
        Ok(devices.iter().map(|d| d.metadata().clone()).collect())
    }

    fn session_handle(&self) -> SessionHandle {
        self.inner.handle.lock().expect("handle lock").clone()
    }

    fn device(&self, device_id: &DeviceId) -> Option<AnyDoorDevice> {
        let devices = self.inner.devices.lock().expect("devices lock");
        devices
            .iter()
            .find(|d| &d.metadata().device_id == device_id)
            .cloned()
            .map(AnyDoorDevice::Mock)
    }
}

/// Handle for controlling a mock account session.
///
/// Registers devices, rotates the session token, and injects listing
/// failures.
#[derive(Debug, Clone)]
pub struct MockAccountHandle {
    inner: Arc<ClientInner>,
}

impl MockAccountHandle {
    /// Register a device on the account.
    ///
    /// Returns the per-device control handle for scripting responses and
    /// delivering push updates.
    pub fn add_device(&self, metadata: Device, capabilities: Capabilities) -> MockDeviceHandle {
        let (device, handle) = MockDoorDevice::new(metadata, capabilities);
        self.inner.devices.lock().expect("devices lock").push(device);
        handle
    }

    /// Simulate a remote-side refresh-token rotation.
    ///
    /// The new token shows up in the session handle on the next inspection,
    /// exactly how the real client exposes rotation.
    pub fn rotate_token(&self, new_token: impl Into<String>) {
        self.inner
            .handle
            .lock()
            .expect("handle lock")
            .insert("refresh_token", new_token);
    }

    /// Set an arbitrary session-handle entry.
    pub fn set_handle_entry(&self, key: impl Into<String>, value: impl Into<String>) {
        self.inner
            .handle
            .lock()
            .expect("handle lock")
            .insert(key, value);
    }

    /// Make `list_devices` fail until cleared.
    pub fn set_list_failure(&self, fail: bool) {
        self.inner.fail_list.store(fail, Ordering::SeqCst);
    }

    /// Number of `list_devices` calls observed.
    pub fn list_calls(&self) -> usize {
        self.inner.list_calls.load(Ordering::SeqCst)
    }

    /// Snapshot of the current session handle.
    pub fn session_handle(&self) -> SessionHandle {
        self.inner.handle.lock().expect("handle lock").clone()
    }
}

/// Mock client factory.
///
/// Hands out clones of one prepared session. Handle-based creation can be
/// rejected to exercise the account/token fallback path.
#[derive(Debug, Clone)]
pub struct MockClientFactory {
    inner: Arc<FactoryInner>,
}

#[derive(Debug)]
struct FactoryInner {
    client: MockDoorClient,
    reject_handle: AtomicBool,
    handle_creates: AtomicUsize,
    account_creates: AtomicUsize,
}

impl MockClientFactory {
    /// Create a factory serving the given session.
    pub fn new(client: MockDoorClient) -> Self {
        Self {
            inner: Arc::new(FactoryInner {
                client,
                reject_handle: AtomicBool::new(false),
                handle_creates: AtomicUsize::new(0),
                account_creates: AtomicUsize::new(0),
            }),
        }
    }

    /// Reject handle-based creation, forcing the account/token fallback.
    pub fn reject_handle_credentials(&self, reject: bool) {
        self.inner.reject_handle.store(reject, Ordering::SeqCst);
    }

    /// Number of successful handle-based creations.
    pub fn handle_creates(&self) -> usize {
        self.inner.handle_creates.load(Ordering::SeqCst)
    }

    /// Number of account/token creations.
    pub fn account_creates(&self) -> usize {
        self.inner.account_creates.load(Ordering::SeqCst)
    }
}

impl ClientFactory for MockClientFactory {
    async fn create(&self, credentials: &ClientCredentials) -> Result<AnyDoorClient> {
        match credentials {
            ClientCredentials::Handle(_) => {
                if self.inner.reject_handle.load(Ordering::SeqCst) {
                    return Err(ClientError::auth("stale session handle"));
                }
                self.inner.handle_creates.fetch_add(1, Ordering::SeqCst);
            }
            ClientCredentials::Account { .. } => {
                self.inner.account_creates.fetch_add(1, Ordering::SeqCst);
            }
        }
        Ok(AnyDoorClient::Mock(self.inner.client.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(id: &str, name: &str) -> Device {
        Device::new(DeviceId::new(id).unwrap(), name, "Chamberlain", "WGDO-1")
    }

    #[tokio::test]
    async fn test_list_devices() {
        let (client, account) = MockDoorClient::new("acct-1", "tok-A");
        account.add_device(meta("GD-1", "Main Garage"), Capabilities::all());
        account.add_device(meta("GD-2", "Side Garage"), Capabilities::poll_only());

        let devices = client.list_devices().await.unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].name, "Main Garage");
        assert_eq!(account.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_list_failure_injection() {
        let (client, account) = MockDoorClient::new("acct-1", "tok-A");
        account.set_list_failure(true);
        assert!(client.list_devices().await.is_err());

        account.set_list_failure(false);
        assert!(client.list_devices().await.is_ok());
    }

    #[tokio::test]
    async fn test_device_lookup() {
        let (client, account) = MockDoorClient::new("acct-1", "tok-A");
        account.add_device(meta("GD-1", "Main Garage"), Capabilities::all());

        let id = DeviceId::new("GD-1").unwrap();
        assert!(client.device(&id).is_some());

        let missing = DeviceId::new("GD-9").unwrap();
        assert!(client.device(&missing).is_none());
    }

    #[test]
    fn test_token_rotation_shows_in_handle() {
        let (client, account) = MockDoorClient::new("acct-1", "tok-A");
        assert_eq!(client.session_handle().refresh_token(), Some("tok-A"));

        account.rotate_token("tok-B");
        assert_eq!(client.session_handle().refresh_token(), Some("tok-B"));
    }

    #[tokio::test]
    async fn test_factory_fallback_path() {
        let (client, _account) = MockDoorClient::new("acct-1", "tok-A");
        let factory = MockClientFactory::new(client);
        factory.reject_handle_credentials(true);

        let handle_creds = ClientCredentials::Handle(SessionHandle::new());
        assert!(factory.create(&handle_creds).await.is_err());

        let account_creds = ClientCredentials::Account {
            account_id: "acct-1".to_string(),
            refresh_token: "tok-A".to_string(),
        };
        assert!(factory.create(&account_creds).await.is_ok());
        assert_eq!(factory.handle_creates(), 0);
        assert_eq!(factory.account_creates(), 1);
    }
}
