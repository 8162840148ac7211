//! Shared types for the doorlink garage-door synchronization core.
//!
//! This crate defines the data model used across the workspace: device
//! identity and metadata, timestamped status snapshots with their ordering
//! rule, and the opaque session handle through which the remote account
//! client exposes rotated refresh tokens.

pub mod constants;
pub mod error;
pub mod types;

pub use error::{CoreError, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
