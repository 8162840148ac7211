use crate::error::StoreResult;
use chrono::{DateTime, Utc};
use doorlink_core::SessionHandle;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The authoritative credential record for one remote account.
///
/// Exactly one row per account exists at any time. The `handle` column
/// stores the remote client's opaque session blob as serialized JSON; it
/// round-trips through [`SessionHandle`] without interpretation, so a
/// vendor-side schema change in the blob never requires a migration here.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Remote account identifier (primary key).
    pub account_id: String,

    /// Long-lived refresh token, rewritten only on rotation.
    pub refresh_token: String,

    /// Serialized opaque session handle.
    pub handle: String,

    /// Poll interval the account was configured with, in seconds.
    pub poll_interval_secs: i64,

    /// Last write timestamp.
    pub updated_at: DateTime<Utc>,
}

impl CredentialRecord {
    /// Build a record, serializing the session handle.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Serialization` if the handle cannot be
    /// serialized.
    pub fn new(
        account_id: impl Into<String>,
        refresh_token: impl Into<String>,
        handle: &SessionHandle,
        poll_interval_secs: i64,
    ) -> StoreResult<Self> {
        Ok(Self {
            account_id: account_id.into(),
            refresh_token: refresh_token.into(),
            handle: handle.to_json()?,
            poll_interval_secs,
            updated_at: Utc::now(),
        })
    }

    /// Deserialize the stored session handle.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Serialization` if the stored blob is not a JSON
    /// object. An empty-object blob is valid and yields an empty handle.
    pub fn session_handle(&self) -> StoreResult<SessionHandle> {
        Ok(SessionHandle::from_json(&self.handle)?)
    }
}
