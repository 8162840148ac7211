use crate::{Result, constants::HANDLE_REFRESH_TOKEN_KEY, error::CoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Stable, vendor-assigned device identifier.
///
/// Unique per remote account and immutable for the life of a session. The
/// remote API hands these out as free-form strings; the only local rule is
/// that an id is non-empty after trimming.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a new device id with validation.
    ///
    /// # Errors
    /// Returns `CoreError::InvalidDeviceId` if the id is empty or whitespace.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(CoreError::InvalidDeviceId(
                "device id must not be empty".to_string(),
            ));
        }
        Ok(DeviceId(id))
    }

    /// Get the raw id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DeviceId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        DeviceId::new(s)
    }
}

/// Door position as reported by the remote API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoorState {
    Open,
    Closed,
    Opening,
    Closing,
    #[default]
    Unknown,
}

impl DoorState {
    /// Lossy parse from the remote wire value.
    ///
    /// The vendor adds states over firmware revisions; anything this crate
    /// does not recognize maps to `Unknown` rather than failing the read.
    #[must_use]
    pub fn from_remote(value: &str) -> Self {
        match value {
            "open" => DoorState::Open,
            "closed" => DoorState::Closed,
            "opening" => DoorState::Opening,
            "closing" => DoorState::Closing,
            _ => DoorState::Unknown,
        }
    }

    /// Wire representation of the state.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DoorState::Open => "open",
            DoorState::Closed => "closed",
            DoorState::Opening => "opening",
            DoorState::Closing => "closing",
            DoorState::Unknown => "unknown",
        }
    }

    /// Returns `true` if the state carries real information.
    #[inline]
    #[must_use]
    pub fn is_known(self) -> bool {
        !matches!(self, DoorState::Unknown)
    }
}

impl fmt::Display for DoorState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Timestamped status snapshot for one device.
///
/// A snapshot is replaced wholesale on every successful read. The fields are
/// all optional-ish on purpose: the remote API returns `{}` for devices it
/// currently cannot reach, and poll failures are recorded locally as
/// [`DeviceStatus::unknown`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatus {
    /// Door position; `Unknown` when the remote gave no answer.
    #[serde(default)]
    pub door_state: DoorState,

    /// Device reachability as reported by the vendor cloud.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub online: Option<bool>,

    /// Battery is critically low.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_critical: Option<bool>,

    /// Battery is low.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_battery: Option<bool>,

    /// Remote-supplied ISO-8601 timestamp of the reading.
    ///
    /// Absent for poll-derived fallbacks, which make no ordering claim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
}

impl DeviceStatus {
    /// The `{}` fallback snapshot: no door state, no ordering claim.
    ///
    /// Written on poll failure so a device degrades to "state unknown"
    /// instead of keeping a value that may no longer be true.
    #[must_use]
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Returns `true` if this snapshot carries no information at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Ordering rule for cache writes.
    ///
    /// An incoming snapshot without a timestamp is best-effort and always
    /// applies. When both sides carry timestamps, the incoming one applies
    /// only if it is not strictly older than the stored one; this is what
    /// prevents a late push from undoing a newer poll, and vice versa.
    /// A stored snapshot without a timestamp is always replaced.
    #[must_use]
    pub fn supersedes(&self, stored: &DeviceStatus) -> bool {
        match (self.last_update, stored.last_update) {
            (Some(incoming), Some(current)) => incoming >= current,
            _ => true,
        }
    }
}

/// Immutable device metadata discovered once per setup cycle.
///
/// Owned by the remote client; the cache and entities reference devices by
/// [`DeviceId`] only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub device_id: DeviceId,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
}

impl Device {
    /// Build device metadata.
    #[must_use]
    pub fn new(
        device_id: DeviceId,
        name: impl Into<String>,
        manufacturer: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            device_id,
            name: name.into(),
            manufacturer: manufacturer.into(),
            model: model.into(),
            serial_number: None,
        }
    }

    /// Attach a serial number.
    #[must_use]
    pub fn with_serial_number(mut self, serial: impl Into<String>) -> Self {
        self.serial_number = Some(serial.into());
        self
    }
}

/// Opaque session state blob returned by the remote client after
/// authentication exchanges.
///
/// The blob is remote-defined and must round-trip through serialization
/// without interpretation. The single exception is
/// [`SessionHandle::refresh_token`], which reads the one key the rotation
/// detector is allowed to understand.
///
/// # Examples
///
/// ```
/// use doorlink_core::SessionHandle;
///
/// let mut handle = SessionHandle::new();
/// handle.insert("refresh_token", "tok-A");
/// handle.insert("region", "eu-west");
///
/// assert_eq!(handle.refresh_token(), Some("tok-A"));
///
/// let json = handle.to_json().unwrap();
/// let back = SessionHandle::from_json(&json).unwrap();
/// assert_eq!(back, handle);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionHandle(Map<String, Value>);

impl SessionHandle {
    /// Create an empty handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a remote-provided key/value map.
    #[must_use]
    pub fn from_map(map: Map<String, Value>) -> Self {
        SessionHandle(map)
    }

    /// Insert a key; value is stored as a JSON string.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), Value::String(value.into()));
    }

    /// Look up a raw value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Extract the rotated refresh token, if the handle carries one.
    ///
    /// Returns `None` for a missing key, a non-string value, or an empty
    /// string. Malformed handle shapes never error; rotation detection is
    /// advisory and must not break door operation.
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        match self.0.get(HANDLE_REFRESH_TOKEN_KEY) {
            Some(Value::String(token)) if !token.is_empty() => Some(token),
            _ => None,
        }
    }

    /// Returns `true` if the handle carries no state.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serialize the handle for persistence.
    ///
    /// # Errors
    /// Returns `CoreError::InvalidHandle` if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.0).map_err(|e| CoreError::InvalidHandle(e.to_string()))
    }

    /// Restore a handle from its persisted form.
    ///
    /// # Errors
    /// Returns `CoreError::InvalidHandle` if the blob is not a JSON object.
    pub fn from_json(json: &str) -> Result<Self> {
        let map: Map<String, Value> =
            serde_json::from_str(json).map_err(|e| CoreError::InvalidHandle(e.to_string()))?;
        Ok(SessionHandle(map))
    }
}
