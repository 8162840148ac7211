//! Remote door client boundary for the doorlink synchronization core.
//!
//! This crate defines the capability surface through which the rest of the
//! workspace talks to a vendor account API: list the garage-door devices on
//! an account, read per-device status, command doors open and closed, and
//! hold a long-lived push subscription. It owns no wire protocol; a real
//! client implementation wraps the vendor SDK, and the mock implementation
//! here stands in for it during development and testing.
//!
//! # Design Philosophy
//!
//! - **Async-first**: all remote operations are asynchronous using native
//!   `async fn` in traits (Rust 1.90 + Edition 2024 RPITIT).
//! - **Capabilities over probing**: what a device supports is captured once
//!   in a [`Capabilities`] set at attach time, never probed per call.
//! - **Channels over callbacks**: push delivery enqueues into a bounded
//!   `mpsc` channel; the subscriber side owns all state mutation.
//! - **Enum dispatch**: native async traits are not object-safe, so
//!   [`AnyDoorClient`]/[`AnyDoorDevice`] wrap concrete implementations the
//!   way a plugin registry would.
//!
//! # Examples
//!
//! ```no_run
//! use doorlink_client::{DoorClient, DoorDevice, AnyDoorClient};
//!
//! async fn print_doors(client: &AnyDoorClient) -> doorlink_client::Result<()> {
//!     for device in client.list_devices().await? {
//!         let door = client.device(&device.device_id).expect("listed device");
//!         let status = door.status().await?;
//!         println!("{}: {}", device.name, status.door_state);
//!     }
//!     Ok(())
//! }
//! ```

pub mod devices;
pub mod error;
pub mod mock;
pub mod traits;

pub use devices::{AnyClientFactory, AnyDoorClient, AnyDoorDevice};
pub use error::{ClientError, Result};
pub use traits::{Capabilities, ClientCredentials, ClientFactory, DoorClient, DoorDevice};
