/*!
 * Limits and Constants
 *
 * Centralized location for capacity limits and blocking-wait parameters.
 * All values include rationale comments explaining WHY they exist.
 */

use std::time::Duration;

// =============================================================================
// PIPE CAPACITY
// =============================================================================

/// Default pipe buffer capacity (6MB)
/// Sized for media streaming: a few seconds of muxed audio/video between a
/// producing add-on and the player
pub const DEFAULT_PIPE_CAPACITY: usize = 6 * 1024 * 1024;

/// Maximum pipe buffer capacity (64MB)
/// Requested capacities are clamped to this; a single pipe must not be able
/// to pin an unbounded amount of process memory
pub const MAX_PIPE_CAPACITY: usize = 64 * 1024 * 1024;

// =============================================================================
// BLOCKING WAITS
// =============================================================================

/// Slice length for blocking read/write waits (100ms)
/// Waits are chopped into bounded slices so overflow/underflow listeners are
/// re-notified periodically while a caller stays blocked
pub const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Ceiling for "wait forever" requests (5 minutes)
/// An unbounded wait with no timeout still terminates eventually; a stream
/// stalled this long is dead, not slow
pub const MAX_BLOCKING_WAIT: Duration = Duration::from_secs(300);
