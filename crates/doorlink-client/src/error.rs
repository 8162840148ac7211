//! Error types for remote client operations.
//!
//! These errors cover the failure modes of a remote account API: network
//! loss, slow responses, authentication rejection, and operations a given
//! device model simply does not support.

/// Result type alias for remote client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur while talking to the remote door API.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The remote session is gone or was never established.
    #[error("Client disconnected: {message}")]
    Disconnected { message: String },

    /// Remote call exceeded its upper bound.
    #[error("Operation timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Operation is not supported by this device.
    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },

    /// Transport-level failure talking to the vendor API.
    #[error("Communication error: {message}")]
    Communication { message: String },

    /// The account session was rejected by the remote side.
    #[error("Authentication error: {message}")]
    Auth { message: String },

    /// The remote returned a payload this client cannot interpret.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },
}

impl ClientError {
    /// Create a new disconnected error.
    pub fn disconnected(message: impl Into<String>) -> Self {
        Self::Disconnected {
            message: message.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a new unsupported operation error.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    /// Create a new communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::Communication {
            message: message.into(),
        }
    }

    /// Create a new authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create a new invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }
}
