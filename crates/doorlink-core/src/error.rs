use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    // Identity errors
    #[error("Invalid device id: {0}")]
    InvalidDeviceId(String),

    // Session handle errors
    #[error("Invalid session handle: {0}")]
    InvalidHandle(String),

    // Timestamp errors
    #[error("Invalid timestamp '{value}': {message}")]
    InvalidTimestamp { value: String, message: String },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing configuration key: {0}")]
    MissingConfig(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
