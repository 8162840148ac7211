//! Core constants for the doorlink synchronization engine.
//!
//! All timing knobs in one place. The values mirror the behavior of the
//! remote account API this crate family integrates: slow, blocking HTTP
//! calls on the vendor side and an at-most-one listener per device on ours.

// ============================================================================
// Scheduling
// ============================================================================

/// Default status poll interval (seconds).
///
/// Used when a configuration record does not carry an explicit interval.
/// The remote API throttles aggressive pollers, so the default errs on the
/// conservative side.
///
/// # Examples
///
/// ```
/// use doorlink_core::constants::DEFAULT_POLL_INTERVAL_SECS;
/// use std::time::Duration;
///
/// let interval = Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS);
/// assert_eq!(interval.as_secs(), 10);
/// ```
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Minimum accepted poll interval (seconds).
///
/// Intervals below this are clamped up; the vendor account API rate-limits
/// status reads well before one request per second.
pub const MIN_POLL_INTERVAL_SECS: u64 = 1;

// ============================================================================
// Remote call bounds
// ============================================================================

/// Upper bound for a single remote call (seconds).
///
/// Applies to `list_devices`, `status`, `open` and `close`. Exceeding it is
/// a transient failure for that cycle, never a fatal error. The long-lived
/// `subscribe` listener is explicitly exempt: it does not return until the
/// subscription ends.
pub const REMOTE_CALL_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Push delivery
// ============================================================================

/// Capacity of the bounded channel between a push listener and the
/// reconciliation loop.
///
/// The listener only enqueues; all cache mutation happens on the consumer
/// side. A full channel applies backpressure to the listener rather than
/// dropping deliveries.
pub const PUSH_CHANNEL_CAPACITY: usize = 32;

/// Session handle key under which the remote client exposes a rotated
/// refresh token.
///
/// The handle is otherwise opaque; this is the single key the rotation
/// detector is allowed to interpret.
pub const HANDLE_REFRESH_TOKEN_KEY: &str = "refresh_token";
