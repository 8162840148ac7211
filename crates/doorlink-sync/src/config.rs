//! Account configuration.

use crate::error::{Result, SyncError};
use crate::scheduler::SyncMode;
use doorlink_core::constants::{DEFAULT_POLL_INTERVAL_SECS, MIN_POLL_INTERVAL_SECS};
use doorlink_core::{DeviceId, SessionHandle};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Configuration for one remote account.
///
/// Mirrors what the user enters once at setup time: the account id, the
/// refresh token, the sync mode, and optionally a tuned poll interval.
/// The session handle is populated on later runs from the credential
/// store, never typed in.
///
/// # Examples
///
/// ```
/// use doorlink_sync::AccountConfig;
///
/// let config = AccountConfig::new("acct-1", "tok-A").with_poll_interval_secs(30);
/// assert_eq!(config.poll_interval().as_secs(), 30);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Remote account identifier.
    pub account_id: String,

    /// Long-lived refresh token entered by the user.
    pub refresh_token: String,

    /// Previously persisted session handle, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<SessionHandle>,

    /// Status poll interval in seconds for poll-mode devices.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Sync mode applied to every device on the account unless overridden.
    #[serde(default)]
    pub mode: SyncMode,

    /// Per-device overrides of the account-wide mode, keyed by device id.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub device_modes: HashMap<String, SyncMode>,
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

impl AccountConfig {
    /// Create a configuration with the default poll interval.
    pub fn new(account_id: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            refresh_token: refresh_token.into(),
            handle: None,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            mode: SyncMode::default(),
            device_modes: HashMap::new(),
        }
    }

    /// Attach a previously persisted session handle.
    #[must_use]
    pub fn with_handle(mut self, handle: SessionHandle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Override the poll interval.
    #[must_use]
    pub fn with_poll_interval_secs(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs;
        self
    }

    /// Set the account-wide sync mode.
    #[must_use]
    pub fn with_mode(mut self, mode: SyncMode) -> Self {
        self.mode = mode;
        self
    }

    /// Override the sync mode for a single device.
    #[must_use]
    pub fn with_device_mode(mut self, device_id: impl Into<String>, mode: SyncMode) -> Self {
        self.device_modes.insert(device_id.into(), mode);
        self
    }

    /// Requested mode for a device, falling back to the account-wide mode.
    #[must_use]
    pub fn mode_for(&self, device_id: &DeviceId) -> SyncMode {
        self.device_modes
            .get(device_id.as_str())
            .copied()
            .unwrap_or(self.mode)
    }

    /// Effective poll interval, clamped to the supported minimum.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(MIN_POLL_INTERVAL_SECS))
    }

    /// Validate the configuration before setup.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Config` for an empty account id or refresh token.
    pub fn validate(&self) -> Result<()> {
        if self.account_id.trim().is_empty() {
            return Err(SyncError::config("account_id must not be empty"));
        }
        if self.refresh_token.trim().is_empty() {
            return Err(SyncError::config("refresh_token must not be empty"));
        }
        Ok(())
    }
}
