//! Mock garage-door device implementation.

use crate::error::{ClientError, Result};
use crate::traits::{Capabilities, DoorDevice};
use doorlink_core::constants::PUSH_CHANNEL_CAPACITY;
use doorlink_core::{Device, DeviceStatus};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};

/// Mock garage-door device for testing and development.
///
/// Simulates one door on a vendor account. Status reads consume a scripted
/// queue before falling back to the current snapshot; push updates arrive
/// through the paired [`MockDeviceHandle`].
///
/// # Examples
///
/// ```
/// use doorlink_client::mock::MockDoorDevice;
/// use doorlink_client::{Capabilities, DoorDevice};
/// use doorlink_core::{Device, DeviceId, DeviceStatus, DoorState};
///
/// #[tokio::main]
/// async fn main() -> doorlink_client::Result<()> {
///     let meta = Device::new(
///         DeviceId::new("GD-1").unwrap(),
///         "Main Garage",
///         "Chamberlain",
///         "WGDO-1",
///     );
///     let (device, handle) = MockDoorDevice::new(meta, Capabilities::all());
///
///     handle.queue_status(DeviceStatus {
///         door_state: DoorState::Closed,
///         ..Default::default()
///     });
///
///     let status = device.status().await?;
///     assert_eq!(status.door_state, DoorState::Closed);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MockDoorDevice {
    inner: Arc<DeviceInner>,
}

#[derive(Debug)]
struct DeviceInner {
    metadata: Device,
    capabilities: Capabilities,

    /// Scripted status responses, consumed front-to-back.
    scripted: Mutex<VecDeque<Result<DeviceStatus>>>,

    /// Fallback snapshot returned once the script runs out.
    current: Mutex<DeviceStatus>,

    open_calls: AtomicUsize,
    close_calls: AtomicUsize,
    fail_commands: AtomicBool,

    /// Receiver side of the push channel; parked here between subscriptions.
    push_rx: tokio::sync::Mutex<Option<mpsc::Receiver<DeviceStatus>>>,

    /// Unsubscribe signal for the active listener.
    unsub_tx: watch::Sender<bool>,

    subscribe_calls: AtomicUsize,
    unsubscribe_calls: AtomicUsize,
    subscription_active: AtomicBool,
}

impl MockDoorDevice {
    /// Create a mock device with the given metadata and capability surface.
    ///
    /// Returns a tuple of (device, control handle); the handle scripts
    /// responses and delivers push updates.
    pub fn new(metadata: Device, capabilities: Capabilities) -> (Self, MockDeviceHandle) {
        let (push_tx, push_rx) = mpsc::channel(PUSH_CHANNEL_CAPACITY);
        let (unsub_tx, _) = watch::channel(false);

        let inner = Arc::new(DeviceInner {
            metadata,
            capabilities,
            scripted: Mutex::new(VecDeque::new()),
            current: Mutex::new(DeviceStatus::unknown()),
            open_calls: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
            fail_commands: AtomicBool::new(false),
            push_rx: tokio::sync::Mutex::new(Some(push_rx)),
            unsub_tx,
            subscribe_calls: AtomicUsize::new(0),
            unsubscribe_calls: AtomicUsize::new(0),
            subscription_active: AtomicBool::new(false),
        });

        let device = Self {
            inner: Arc::clone(&inner),
        };
        let handle = MockDeviceHandle { inner, push_tx };

        (device, handle)
    }

    fn require(&self, supported: bool, operation: &str) -> Result<()> {
        if supported {
            Ok(())
        } else {
            Err(ClientError::unsupported(operation))
        }
    }
}

impl DoorDevice for MockDoorDevice {
    fn metadata(&self) -> &Device {
        &self.inner.metadata
    }

    fn capabilities(&self) -> Capabilities {
        self.inner.capabilities
    }

    async fn status(&self) -> Result<DeviceStatus> {
        self.require(self.inner.capabilities.status, "status")?;

        if let Some(scripted) = self.inner.scripted.lock().expect("scripted lock").pop_front() {
            return scripted;
        }
        Ok(self.inner.current.lock().expect("current lock").clone())
    }

    async fn open(&self) -> Result<()> {
        self.require(self.inner.capabilities.open, "open")?;
        if self.inner.fail_commands.load(Ordering::SeqCst) {
            return Err(ClientError::communication("command rejected"));
        }
        self.inner.open_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.require(self.inner.capabilities.close, "close")?;
        if self.inner.fail_commands.load(Ordering::SeqCst) {
            return Err(ClientError::communication("command rejected"));
        }
        self.inner.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn subscribe(&self, tx: mpsc::Sender<DeviceStatus>) -> Result<()> {
        self.require(self.inner.capabilities.subscribe, "subscribe")?;

        if self.inner.subscription_active.swap(true, Ordering::SeqCst) {
            return Err(ClientError::communication("subscription already active"));
        }
        self.inner.subscribe_calls.fetch_add(1, Ordering::SeqCst);

        let mut rx = self
            .inner
            .push_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| ClientError::communication("push channel unavailable"))?;

        // Arm the teardown signal for this subscription.
        self.inner.unsub_tx.send_replace(false);
        let mut unsub_rx = self.inner.unsub_tx.subscribe();

        loop {
            tokio::select! {
                changed = unsub_rx.changed() => {
                    if changed.is_err() || *unsub_rx.borrow() {
                        break;
                    }
                }
                delivery = rx.recv() => match delivery {
                    Some(status) => {
                        // Consumer gone means the subscription is over.
                        if tx.send(status).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }

        *self.inner.push_rx.lock().await = Some(rx);
        self.inner.subscription_active.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn unsubscribe(&self) -> Result<()> {
        self.require(self.inner.capabilities.unsubscribe, "unsubscribe")?;
        self.inner.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.unsub_tx.send_replace(true);
        Ok(())
    }
}

/// Handle for controlling a mock door device.
///
/// Scripts status responses, delivers push updates, and exposes call
/// counters for assertions.
#[derive(Debug, Clone)]
pub struct MockDeviceHandle {
    inner: Arc<DeviceInner>,
    push_tx: mpsc::Sender<DeviceStatus>,
}

impl MockDeviceHandle {
    /// Queue a status response; consumed by the next `status()` call.
    pub fn queue_status(&self, status: DeviceStatus) {
        self.inner
            .scripted
            .lock()
            .expect("scripted lock")
            .push_back(Ok(status));
    }

    /// Queue a status failure; consumed by the next `status()` call.
    pub fn queue_status_failure(&self, error: ClientError) {
        self.inner
            .scripted
            .lock()
            .expect("scripted lock")
            .push_back(Err(error));
    }

    /// Set the fallback snapshot returned after the script is exhausted.
    pub fn set_current_status(&self, status: DeviceStatus) {
        *self.inner.current.lock().expect("current lock") = status;
    }

    /// Deliver a push update to the active subscription.
    ///
    /// # Errors
    ///
    /// Returns an error if the device side of the push channel is gone.
    pub async fn push_status(&self, status: DeviceStatus) -> Result<()> {
        self.push_tx
            .send(status)
            .await
            .map_err(|_| ClientError::disconnected("push channel closed"))
    }

    /// Make open/close commands fail until cleared.
    pub fn fail_commands(&self, fail: bool) {
        self.inner.fail_commands.store(fail, Ordering::SeqCst);
    }

    /// Number of open commands the device accepted.
    pub fn open_calls(&self) -> usize {
        self.inner.open_calls.load(Ordering::SeqCst)
    }

    /// Number of close commands the device accepted.
    pub fn close_calls(&self) -> usize {
        self.inner.close_calls.load(Ordering::SeqCst)
    }

    /// Number of subscribe calls that established a listener.
    pub fn subscribe_calls(&self) -> usize {
        self.inner.subscribe_calls.load(Ordering::SeqCst)
    }

    /// Number of unsubscribe calls.
    pub fn unsubscribe_calls(&self) -> usize {
        self.inner.unsubscribe_calls.load(Ordering::SeqCst)
    }

    /// Whether a listener is currently live.
    pub fn subscription_active(&self) -> bool {
        self.inner.subscription_active.load(Ordering::SeqCst)
    }
}
