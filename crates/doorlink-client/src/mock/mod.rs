//! Mock remote client for testing and development.
//!
//! This module provides a simulated vendor account API that can be
//! controlled programmatically: scripted status reads, injected failures,
//! push deliveries, and session-token rotation, all without network access.

mod client;
mod device;

pub use client::{MockAccountHandle, MockClientFactory, MockDoorClient};
pub use device::{MockDeviceHandle, MockDoorDevice};
