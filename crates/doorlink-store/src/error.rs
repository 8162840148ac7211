use thiserror::Error;

/// Storage-specific error types for the credential store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database connection or query execution failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration execution failed
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Credential record not found for an account
    #[error("Credential record not found for account {0}")]
    NotFound(String),

    /// Session handle blob failed to (de)serialize
    #[error("Handle serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<doorlink_core::CoreError> for StoreError {
    fn from(err: doorlink_core::CoreError) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Specialized result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;
