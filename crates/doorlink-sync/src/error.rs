//! Error types for the synchronization core.

use doorlink_client::ClientError;
use doorlink_core::CoreError;
use doorlink_store::StoreError;

/// Result type alias for synchronization operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur in the synchronization core.
///
/// Setup errors are fatal for the account they belong to; everything else
/// is transient and scoped to a single device cycle. Rotation persistence
/// failures never surface here at all, they are absorbed by the watcher
/// and retried on the next observation.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Account setup could not complete; no entities were created.
    #[error("Account setup failed: {message}")]
    Setup { message: String },

    /// A remote client call failed.
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    /// A push subscription could not be established or died mid-flight.
    ///
    /// The device degrades to "no further push updates"; the core does not
    /// re-subscribe on its own.
    #[error("Subscription error: {message}")]
    Subscription { message: String },

    /// Credential persistence failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A shared type rejected its input.
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    /// The device is not attached to the supervisor.
    #[error("Device not attached: {device_id}")]
    NotAttached { device_id: String },

    /// The device is already attached to the supervisor.
    #[error("Device already attached: {device_id}")]
    AlreadyAttached { device_id: String },

    /// Invalid account configuration.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl SyncError {
    /// Create a new setup error.
    pub fn setup(message: impl Into<String>) -> Self {
        Self::Setup {
            message: message.into(),
        }
    }

    /// Create a new not-attached error.
    pub fn not_attached(device_id: impl Into<String>) -> Self {
        Self::NotAttached {
            device_id: device_id.into(),
        }
    }

    /// Create a new subscription error.
    pub fn subscription(message: impl Into<String>) -> Self {
        Self::Subscription {
            message: message.into(),
        }
    }

    /// Create a new already-attached error.
    pub fn already_attached(device_id: impl Into<String>) -> Self {
        Self::AlreadyAttached {
            device_id: device_id.into(),
        }
    }

    /// Create a new configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
