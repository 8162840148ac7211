//! Durable credential storage for the doorlink synchronization core.
//!
//! This crate persists one [`CredentialRecord`] per remote account: the
//! long-lived refresh token, the opaque session handle blob, and the poll
//! interval the account was configured with. The record is read at startup
//! and conditionally rewritten whenever the rotation detector observes a
//! new token in the session handle.
//!
//! # Architecture
//!
//! - [`Database`]: pooled SQLite connection manager with embedded
//!   migrations and WAL journaling.
//! - [`CredentialRepository`]: data-access trait with a SQLite
//!   implementation; rotation persistence is a single atomic
//!   compare-then-write statement, so concurrent writers for the same
//!   account serialize on the row and an unchanged token is a no-op.
//!
//! # Examples
//!
//! ```no_run
//! use doorlink_store::{CredentialRecord, CredentialRepository, Database, DatabaseConfig};
//! use doorlink_store::SqliteCredentialRepository;
//! use doorlink_core::SessionHandle;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(DatabaseConfig::new("doorlink.db")).await?;
//! let repo = SqliteCredentialRepository::new(db.pool().clone());
//!
//! let record = CredentialRecord::new("acct-1", "tok-A", &SessionHandle::new(), 10)?;
//! repo.insert(&record).await?;
//!
//! // Later, after the remote rotated the token:
//! let mut rotated = SessionHandle::new();
//! rotated.insert("refresh_token", "tok-B");
//! let written = repo.persist_rotation("acct-1", "tok-B", &rotated).await?;
//! assert!(written);
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod models;
pub mod repositories;

pub use connection::{Database, DatabaseConfig};
pub use error::{StoreError, StoreResult};
pub use models::CredentialRecord;
pub use repositories::{CredentialRepository, SqliteCredentialRepository};
