//! Per-device update scheduling.
//!
//! The supervisor drives one update strategy per attached device. Devices
//! with a push channel get a dedicated listener task plus a reconciliation
//! task that owns all cache writes for the device; everything else is
//! polled on a fixed interval. Both strategies converge on the shared
//! [`StatusCache`], and both run the rotation watcher after every remote
//! interaction.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  status()   ┌──────────────┐
//! │ Poll Task    │────────────►│              │
//! │ (per device) │             │ StatusCache  │
//! └──────────────┘             │              │──────► Entities
//! ┌──────────────┐  mpsc       │              │
//! │ Push         │────────────►│              │
//! │ Listener ────┼─► Reconcile └──────────────┘
//! └──────────────┘
//! ```
//!
//! # Detach safety
//!
//! Detach cancels the device's tasks and awaits their termination before
//! tearing down the subscription and removing the cache entry. The
//! reconciliation loop takes the cancellation branch first, so a delivery
//! already sitting in the channel is dropped instead of written after
//! detach. A poll result that was in flight when detach happened is
//! checked against the cancellation token after the await and discarded.

use crate::cache::StatusCache;
use crate::error::{Result, SyncError};
use crate::rotation::RotationWatcher;
use doorlink_client::{AnyDoorClient, AnyDoorDevice, ClientError, DoorClient, DoorDevice};
use doorlink_core::constants::{PUSH_CHANNEL_CAPACITY, REMOTE_CALL_TIMEOUT_SECS};
use doorlink_core::{DeviceId, DeviceStatus};
use doorlink_store::CredentialRepository;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Update strategy for a device.
///
/// A configuration choice, never negotiated with the remote client at
/// runtime. A push request against a device without a push channel falls
/// back to polling at attach time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Fixed-interval status polling.
    #[default]
    Poll,

    /// Long-lived push subscription with a reconciliation loop.
    Push,
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Poll => write!(f, "poll"),
            Self::Push => write!(f, "push"),
        }
    }
}

/// One attached device and its running tasks.
#[derive(Debug)]
struct Attachment {
    attachment_id: Uuid,
    device: AnyDoorDevice,
    mode: SyncMode,
    cancel: CancellationToken,
    tasks: AttachmentTasks,
}

/// Join handles for the tasks driving one attachment.
#[derive(Debug)]
enum AttachmentTasks {
    Poll {
        worker: JoinHandle<Result<()>>,
    },
    Push {
        listener: JoinHandle<Result<()>>,
        reconcile: JoinHandle<Result<()>>,
    },
}

/// Supervises the update tasks for every device on one account.
///
/// Each attachment owns the join handles of its tasks; detach cancels
/// them, awaits their termination, and classifies how each went down.
pub struct DeviceSupervisor<R> {
    client: AnyDoorClient,
    cache: StatusCache,
    watcher: Arc<RotationWatcher<R>>,
    poll_interval: Duration,
    attachments: HashMap<DeviceId, Attachment>,
}

impl<R: CredentialRepository + 'static> DeviceSupervisor<R> {
    /// Create a supervisor for one account session.
    pub fn new(
        client: AnyDoorClient,
        cache: StatusCache,
        watcher: Arc<RotationWatcher<R>>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            client,
            cache,
            watcher,
            poll_interval,
            attachments: HashMap::new(),
        }
    }

    /// Attach a device and start its update tasks in the requested mode.
    ///
    /// A push request against a device that has no push channel falls back
    /// to polling; the effective mode is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the device is already attached, or if polling
    /// is needed and the device does not answer status reads.
    pub fn attach(&mut self, device: AnyDoorDevice, requested: SyncMode) -> Result<SyncMode> {
        let device_id = device.metadata().device_id.clone();
        if self.attachments.contains_key(&device_id) {
            return Err(SyncError::already_attached(device_id.as_str()));
        }

        let capabilities = device.capabilities();
        let mode = match requested {
            SyncMode::Push if capabilities.supports_push() => SyncMode::Push,
            SyncMode::Push => {
                warn!(device_id = %device_id, "push mode configured but unsupported, polling instead");
                SyncMode::Poll
            }
            SyncMode::Poll => SyncMode::Poll,
        };
        if mode == SyncMode::Poll && !capabilities.status {
            return Err(SyncError::Client(ClientError::unsupported("status")));
        }

        let attachment_id = Uuid::new_v4();
        let cancel = CancellationToken::new();

        let tasks = match mode {
            SyncMode::Poll => AttachmentTasks::Poll {
                worker: tokio::spawn(poll_task(
                    device.clone(),
                    self.client.clone(),
                    self.cache.clone(),
                    Arc::clone(&self.watcher),
                    cancel.clone(),
                    self.poll_interval,
                )),
            },
            SyncMode::Push => {
                let (tx, rx) = mpsc::channel(PUSH_CHANNEL_CAPACITY);
                AttachmentTasks::Push {
                    listener: tokio::spawn(push_listener(device.clone(), tx)),
                    reconcile: tokio::spawn(push_reconcile(
                        device_id.clone(),
                        rx,
                        self.client.clone(),
                        self.cache.clone(),
                        Arc::clone(&self.watcher),
                        cancel.clone(),
                    )),
                }
            }
        };

        info!(
            device_id = %device_id,
            %attachment_id,
            %mode,
            "attached device"
        );

        self.attachments.insert(
            device_id,
            Attachment {
                attachment_id,
                device,
                mode,
                cancel,
                tasks,
            },
        );

        Ok(mode)
    }

    /// Detach a device and stop its update tasks.
    ///
    /// Cancels the device's tasks and awaits their termination, then tears
    /// down the subscription for push devices, then drops the cache entry.
    /// After this returns, no late delivery for the device can reach the
    /// cache.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::NotAttached` for an unknown device id.
    pub async fn detach(&mut self, device_id: &DeviceId) -> Result<()> {
        let attachment = self
            .attachments
            .remove(device_id)
            .ok_or_else(|| SyncError::not_attached(device_id.as_str()))?;

        attachment.cancel.cancel();

        match attachment.tasks {
            AttachmentTasks::Poll { worker } => {
                join_task(device_id, "poll", worker).await;
            }
            AttachmentTasks::Push {
                listener,
                reconcile,
            } => {
                // The reconcile loop must be gone before the cache entry is
                // removed, or a delivery already in the channel could land
                // after the removal.
                join_task(device_id, "reconcile", reconcile).await;

                if attachment.device.capabilities().unsubscribe {
                    let teardown = timeout(
                        Duration::from_secs(REMOTE_CALL_TIMEOUT_SECS),
                        attachment.device.unsubscribe(),
                    )
                    .await;
                    match teardown {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            warn!(device_id = %device_id, error = %e, "unsubscribe failed during detach");
                        }
                        Err(_) => {
                            warn!(device_id = %device_id, "unsubscribe timed out during detach");
                        }
                    }
                }

                // The listener ends with the subscription; join_task aborts
                // it if the teardown did not get through.
                join_task(device_id, "listener", listener).await;
            }
        }

        self.cache.remove(device_id).await;

        info!(
            device_id = %device_id,
            attachment_id = %attachment.attachment_id,
            "detached device"
        );
        Ok(())
    }

    /// Returns `true` if the device is currently attached.
    #[must_use]
    pub fn is_attached(&self, device_id: &DeviceId) -> bool {
        self.attachments.contains_key(device_id)
    }

    /// The update mode chosen for an attached device.
    #[must_use]
    pub fn mode(&self, device_id: &DeviceId) -> Option<SyncMode> {
        self.attachments.get(device_id).map(|a| a.mode)
    }

    /// Liveness token of the device's attachment.
    ///
    /// Stable for the life of the attachment; a re-attach after detach gets
    /// a fresh one. At most one exists per device.
    #[must_use]
    pub fn attachment_id(&self, device_id: &DeviceId) -> Option<Uuid> {
        self.attachments.get(device_id).map(|a| a.attachment_id)
    }

    /// Number of attached devices.
    #[must_use]
    pub fn attached_count(&self) -> usize {
        self.attachments.len()
    }

    /// Stop every device task and tear down subscriptions.
    ///
    /// Detaches every device cooperatively; each detach joins the device's
    /// tasks and logs any abnormal termination.
    pub async fn shutdown(mut self) {
        let ids: Vec<DeviceId> = self.attachments.keys().cloned().collect();
        for device_id in &ids {
            if let Err(e) = self.detach(device_id).await {
                warn!(device_id = %device_id, error = %e, "detach during shutdown failed");
            }
        }
        debug!("supervisor shut down");
    }
}

impl<R> std::fmt::Debug for DeviceSupervisor<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSupervisor")
            .field("poll_interval", &self.poll_interval)
            .field("attached", &self.attachments.len())
            .finish_non_exhaustive()
    }
}

/// Await a device task's termination, classifying how it went down.
///
/// A task that fails to end within the remote-call bound is aborted; a
/// cancelled termination is the expected outcome of that abort.
async fn join_task(device_id: &DeviceId, task: &str, mut handle: JoinHandle<Result<()>>) {
    let result = match timeout(Duration::from_secs(REMOTE_CALL_TIMEOUT_SECS), &mut handle).await {
        Ok(result) => result,
        Err(_) => {
            handle.abort();
            handle.await
        }
    };

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            warn!(device_id = %device_id, task, error = %e, "device task ended with error");
        }
        Err(e) if e.is_cancelled() => {}
        Err(e) => {
            warn!(device_id = %device_id, task, error = %e, "device task panicked");
        }
    }
}

/// Fixed-interval poll loop for one device.
///
/// A failed or timed-out read degrades the cached snapshot to
/// [`DeviceStatus::unknown`] rather than keeping a value that may no
/// longer be true. The session handle is inspected for token rotation
/// after every remote call.
async fn poll_task<R: CredentialRepository>(
    device: AnyDoorDevice,
    client: AnyDoorClient,
    cache: StatusCache,
    watcher: Arc<RotationWatcher<R>>,
    cancel: CancellationToken,
    interval: Duration,
) -> Result<()> {
    let device_id = device.metadata().device_id.clone();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let outcome = timeout(
            Duration::from_secs(REMOTE_CALL_TIMEOUT_SECS),
            device.status(),
        )
        .await;

        // Detach may have landed while the read was in flight; its result
        // must not reach the cache.
        if cancel.is_cancelled() {
            break;
        }

        match outcome {
            Ok(Ok(status)) => {
                cache.put(device_id.clone(), status).await;
            }
            Ok(Err(e)) => {
                warn!(device_id = %device_id, error = %e, "status poll failed");
                cache.put(device_id.clone(), DeviceStatus::unknown()).await;
            }
            Err(_) => {
                warn!(device_id = %device_id, "status poll timed out");
                cache.put(device_id.clone(), DeviceStatus::unknown()).await;
            }
        }

        watcher.observe(&client.session_handle()).await;
    }

    Ok(())
}

/// Long-lived push listener for one device.
///
/// Runs the subscription until it ends; never time-bounded. Enqueues only,
/// all cache mutation happens in the reconciliation loop.
async fn push_listener(device: AnyDoorDevice, tx: mpsc::Sender<DeviceStatus>) -> Result<()> {
    let device_id = device.metadata().device_id.clone();

    match device.subscribe(tx).await {
        Ok(()) => {
            debug!(device_id = %device_id, "push subscription ended");
            Ok(())
        }
        Err(e) => {
            // No automatic re-subscribe; the device degrades to whatever
            // the cache last saw until it is re-attached.
            warn!(device_id = %device_id, error = %e, "push subscription failed");
            Err(SyncError::subscription(e.to_string()))
        }
    }
}

/// Consumes push deliveries for one device and writes them to the cache.
///
/// Owns the receiving side of the push channel; cancellation drops it,
/// which is what makes detach safe against late deliveries.
async fn push_reconcile<R: CredentialRepository>(
    device_id: DeviceId,
    mut rx: mpsc::Receiver<DeviceStatus>,
    client: AnyDoorClient,
    cache: StatusCache,
    watcher: Arc<RotationWatcher<R>>,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        // Cancellation wins over a delivery already sitting in the channel;
        // detach relies on this to keep late writes out of the cache.
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            delivery = rx.recv() => match delivery {
                Some(status) => {
                    cache.put(device_id.clone(), status).await;
                    watcher.observe(&client.session_handle()).await;
                }
                None => {
                    debug!(device_id = %device_id, "push channel closed");
                    break;
                }
            },
        }
    }

    Ok(())
}
