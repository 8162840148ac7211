//! Synchronization core for the doorlink garage-door integration.
//!
//! This crate ties the workspace together: it reconciles device state
//! arriving over two paths of very different latency (interval polling and
//! push subscriptions) into one coherent cache, detects refresh-token
//! rotation after every remote interaction, and exposes attached doors as
//! entity façades a consumer can read and command.
//!
//! # Architecture
//!
//! - [`StatusCache`]: shared snapshot store; the timestamp ordering rule
//!   guarantees a late push never undoes a newer poll.
//! - [`DeviceSupervisor`]: one configured update strategy per device,
//!   poll or push, with a fallback to polling when push is configured but
//!   unsupported. Each attachment owns its task handles.
//! - [`RotationWatcher`]: constant-time rotation detection plus durable,
//!   exactly-once persistence through the credential store.
//! - [`setup_account`] / [`AccountRuntime`]: account bootstrap with stored
//!   credentials first, fallback re-authentication, fatal device listing,
//!   per-device failure isolation.
//! - [`DoorEntity`]: consumer façade for cache reads, time-bounded
//!   commands, and post-command refresh.
//!
//! # Examples
//!
//! ```no_run
//! use doorlink_client::AnyClientFactory;
//! use doorlink_store::{Database, DatabaseConfig, SqliteCredentialRepository};
//! use doorlink_sync::{AccountConfig, StatusCache, setup_account};
//!
//! # async fn example(factory: AnyClientFactory) -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(DatabaseConfig::new("doorlink.db")).await?;
//! let repo = SqliteCredentialRepository::new(db.pool().clone());
//!
//! let config = AccountConfig::new("acct-1", "tok-A");
//! let runtime = setup_account(&factory, repo, &config, StatusCache::new()).await?;
//!
//! for door in runtime.entities() {
//!     println!("{}: closed={:?}", door.name(), door.is_closed().await);
//! }
//!
//! runtime.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod entity;
pub mod error;
pub mod rotation;
pub mod scheduler;
pub mod setup;

pub use cache::{PutOutcome, StatusCache};
pub use config::AccountConfig;
pub use entity::DoorEntity;
pub use error::{Result, SyncError};
pub use rotation::{RotationOutcome, RotationResult, RotationWatcher, detect};
pub use scheduler::{DeviceSupervisor, SyncMode};
pub use setup::{AccountRuntime, setup_account};
