//! Remote client trait definitions.
//!
//! These traits establish the contract between the synchronization core and
//! a vendor account API. A client represents one authenticated account
//! session shared by every device on the account; a device exposes the
//! per-door operations. Both use native `async fn` methods (Rust 1.90 +
//! Edition 2024 RPITIT), so dynamic dispatch goes through the enum wrappers
//! in [`devices`](crate::devices) rather than `dyn`.

#![allow(async_fn_in_trait)]

use crate::devices::{AnyDoorClient, AnyDoorDevice};
use crate::error::Result;
use doorlink_core::{Device, DeviceId, DeviceStatus, SessionHandle};
use tokio::sync::mpsc;

/// What a device supports, determined once at attach time.
///
/// The vendor mixes hardware generations on one account: older openers have
/// no push channel, gateway-only models cannot be commanded. Instead of
/// probing per call, the client reports the supported surface up front and
/// the scheduler picks its strategy from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Device answers on-demand status reads.
    pub status: bool,

    /// Device accepts the open command.
    pub open: bool,

    /// Device accepts the close command.
    pub close: bool,

    /// Device supports a long-lived push subscription.
    pub subscribe: bool,

    /// Device supports explicit subscription teardown.
    pub unsubscribe: bool,
}

impl Capabilities {
    /// Full capability surface: pollable, commandable, subscribable.
    #[must_use]
    pub fn all() -> Self {
        Self {
            status: true,
            open: true,
            close: true,
            subscribe: true,
            unsubscribe: true,
        }
    }

    /// Poll-only device: status reads and commands, no push channel.
    #[must_use]
    pub fn poll_only() -> Self {
        Self {
            subscribe: false,
            unsubscribe: false,
            ..Self::all()
        }
    }

    /// Returns `true` if the device can be driven in push mode.
    #[inline]
    #[must_use]
    pub fn supports_push(&self) -> bool {
        self.subscribe
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::all()
    }
}

/// Credentials accepted by [`ClientFactory::create`].
///
/// A stored session handle is preferred when available because it avoids a
/// fresh authentication exchange; the account/token pair is the cold-start
/// path and the fallback when a stale handle is rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCredentials {
    /// Cold start from the account id and its long-lived refresh token.
    Account {
        account_id: String,
        refresh_token: String,
    },

    /// Resume from a previously persisted opaque session handle.
    Handle(SessionHandle),
}

/// Constructs account clients from credentials.
///
/// This is the `create(account_id, refresh_token)` / `create(handle)`
/// boundary of the vendor SDK.
pub trait ClientFactory: Send + Sync {
    /// Create a client session from the given credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication is rejected or the vendor API is
    /// unreachable. Handle-based creation failing is expected for stale
    /// handles; callers fall back to account credentials.
    async fn create(&self, credentials: &ClientCredentials) -> Result<AnyDoorClient>;
}

/// One authenticated account session.
///
/// The session object is shared by all devices under the account. Its
/// handle is inspected after every remote call (read-mostly) to detect
/// refresh-token rotation, so [`DoorClient::session_handle`] must be a
/// cheap snapshot.
pub trait DoorClient: Send + Sync {
    /// The account this session belongs to.
    fn account_id(&self) -> &str;

    /// Discover the devices on the account.
    ///
    /// Called once per setup cycle. Failure here is fatal for the whole
    /// account setup; no partial entity set is built from it.
    ///
    /// # Errors
    ///
    /// Returns an error if the account listing cannot be fetched.
    async fn list_devices(&self) -> Result<Vec<Device>>;

    /// Snapshot of the opaque session state blob.
    ///
    /// The remote side may have embedded a rotated refresh token in it;
    /// interpreting that is the rotation detector's job, not the client's.
    fn session_handle(&self) -> SessionHandle;

    /// Per-device operation surface for a previously listed device.
    ///
    /// Returns `None` for ids the account does not know.
    fn device(&self, device_id: &DeviceId) -> Option<AnyDoorDevice>;
}

/// Per-door operation surface.
///
/// Cloneable view onto the shared account session; all methods take `&self`
/// because the underlying session is shared across devices and workers.
pub trait DoorDevice: Send + Sync {
    /// Immutable metadata discovered at listing time.
    fn metadata(&self) -> &Device;

    /// Supported operation surface, fixed for the session lifetime.
    fn capabilities(&self) -> Capabilities;

    /// Read the current status snapshot.
    ///
    /// The remote returns `{}` for devices it cannot currently reach; that
    /// decodes to [`DeviceStatus::unknown`].
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or session loss. Callers treat
    /// this as transient and retry on the next cycle.
    async fn status(&self) -> Result<DeviceStatus>;

    /// Command the door open.
    ///
    /// # Errors
    ///
    /// Returns an error if the device rejects the command or the call fails
    /// in transit.
    async fn open(&self) -> Result<()>;

    /// Command the door closed.
    ///
    /// # Errors
    ///
    /// Returns an error if the device rejects the command or the call fails
    /// in transit.
    async fn close(&self) -> Result<()>;

    /// Run the push listener, delivering every status update into `tx`.
    ///
    /// This call does not return until the subscription ends: explicit
    /// [`unsubscribe`](DoorDevice::unsubscribe), remote teardown, or the
    /// receiving side dropping the channel. It must therefore run on a
    /// dedicated task, never inside a time-bounded operation path. At most
    /// one subscription is live per device.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription cannot be established or dies
    /// mid-flight. The core logs this and degrades to "no further push
    /// updates"; it does not auto-resubscribe.
    async fn subscribe(&self, tx: mpsc::Sender<DeviceStatus>) -> Result<()>;

    /// Tear down the active push subscription.
    ///
    /// Detach must await this before considering the device gone, so no
    /// callback delivery races the teardown.
    ///
    /// # Errors
    ///
    /// Returns an error if the device does not support teardown or the
    /// request fails in transit.
    async fn unsubscribe(&self) -> Result<()>;
}
