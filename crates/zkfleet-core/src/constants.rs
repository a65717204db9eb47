//! Fleet-wide constants for the zkfleet capture agent.
//!
//! These defaults mirror the behavior of the terminals deployed in the
//! field: short connect timeouts, a 2-second poll cadence, and a fixed
//! 5-second retry backoff. Capture behavior can be tuned per run through
//! `CaptureConfig` in the `zkfleet-capture` crate; the values here are the
//! baseline every component agrees on.

// ============================================================================
// Device Connectivity
// ============================================================================

/// Default UDP/TCP port attendance terminals listen on.
pub const DEFAULT_TERMINAL_PORT: u16 = 4370;

/// Default timeout for a single connect attempt (milliseconds).
///
/// Terminals on a healthy LAN answer well inside this window; anything
/// slower is treated as unreachable and retried after the backoff.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 3000;

// ============================================================================
// Capture Cadence
// ============================================================================

/// Delay between successful poll cycles for one device (milliseconds).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

/// Fixed backoff after a failed connect attempt (milliseconds).
///
/// The backoff does not grow: transient outages retry indefinitely at
/// this cadence until the capture is stopped.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 5000;

/// Delay between successive worker spawns in `start_all` (milliseconds).
///
/// Staggering spawns avoids a connection storm when a large fleet is
/// started at once.
pub const DEFAULT_STAGGER_DELAY_MS: u64 = 100;

// ============================================================================
// Event Delivery
// ============================================================================

/// Capacity of the bounded channel between poll workers and the sink
/// dispatcher.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

// ============================================================================
// Fleet Defaults
// ============================================================================

/// Fallback fleet used when no explicit target list is configured.
pub const DEFAULT_FLEET: &[&str] = &["192.168.9.229", "192.168.7.229", "192.168.10.229"];
