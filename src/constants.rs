//! Application-wide constants for handwire.
//!
//! This module centralizes all magic numbers and configuration defaults
//! to improve maintainability and discoverability. Constants are grouped
//! by domain with documentation explaining their purpose.
//!
//! # Categories
//!
//! - **Network**: connection parameters and socket buffer sizing
//! - **Framing**: message assembly limits
//! - **Reconnect**: backoff schedule bounds
//! - **Driver**: host loop pacing and smoothing reference rate

use std::time::Duration;

// ============================================================================
// Network
// ============================================================================

/// Default tracker address.
///
/// The tracker process binds to loopback; remote trackers are configured
/// explicitly, never assumed.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1";

/// Default tracker port.
pub const DEFAULT_PORT: u16 = 65431;

/// Bound on a single connect attempt.
///
/// The host frame loop must never hang on an unreachable tracker; a few
/// seconds covers slow LAN resolution while keeping startup responsive.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Receive buffer size for one socket poll.
///
/// A full two-hand tracking message is roughly 2-3 KiB of JSON; 16 KiB
/// holds several queued messages per poll. The legacy 1 KiB buffer
/// silently truncated frames.
pub const RECV_BUFFER_SIZE: usize = 16 * 1024;

// ============================================================================
// Framing
// ============================================================================

/// Ceiling on bytes buffered without forming a complete frame (1 MiB).
///
/// Past this the assembler assumes a desynchronized or malicious peer,
/// discards the buffer, and the session continues.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

// ============================================================================
// Reconnect
// ============================================================================

/// First delay after a failed or dropped connection.
pub const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// Backoff cap. Delays double per consecutive failure up to this bound.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

// ============================================================================
// Driver
// ============================================================================

/// Host loop frame delay (approximately 60 ticks per second).
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Reference tick rate for the smoothing factor.
///
/// A profile smoothing factor of `s` is the slerp alpha applied per tick
/// at exactly this rate; other rates are compensated so convergence speed
/// is frame-rate independent.
pub const SMOOTHING_REFERENCE_HZ: f32 = 60.0;

/// Interval between periodic pose summaries in the binary.
pub const REPORT_INTERVAL: Duration = Duration::from_secs(5);
