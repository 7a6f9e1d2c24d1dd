//! Default values and bounds for every farming setting.
//!
//! Each numeric setting has a `DEFAULT_*`, `MIN_*` and `MAX_*` constant.
//! Values written through any path are clamped into `[MIN, MAX]`.

use std::fmt::Display;

// =============================================================================
// Timing
// =============================================================================

/// Base pacing delay between actions, in milliseconds (randomized ±50%).
pub const DEFAULT_PACING_INTERVAL_MS: u64 = 3_000;
pub const MIN_PACING_INTERVAL_MS: u64 = 0;
pub const MAX_PACING_INTERVAL_MS: u64 = 600_000;

/// Pause between two full cycles, in seconds.
pub const DEFAULT_CYCLE_PAUSE_SECS: u64 = 300;
pub const MIN_CYCLE_PAUSE_SECS: u64 = 0;
pub const MAX_CYCLE_PAUSE_SECS: u64 = 86_400;

/// Upper bound on a single pipeline step, in seconds.
pub const DEFAULT_STEP_TIMEOUT_SECS: u64 = 30;
pub const MIN_STEP_TIMEOUT_SECS: u64 = 1;
pub const MAX_STEP_TIMEOUT_SECS: u64 = 600;

// =============================================================================
// Commands
// =============================================================================

/// Outstanding-action ceiling per village.
pub const DEFAULT_COMMAND_CEILING: u32 = 50;
pub const MIN_COMMAND_CEILING: u32 = 1;
pub const MAX_COMMAND_CEILING: u32 = 1_000;

/// Slots kept free for manual use.
pub const DEFAULT_RESERVED_COMMAND_SLOTS: u32 = 0;
pub const MIN_RESERVED_COMMAND_SLOTS: u32 = 0;
pub const MAX_RESERVED_COMMAND_SLOTS: u32 = 100;

/// Maximum round-trip transit time of a single action, in seconds.
pub const DEFAULT_MAX_TRAVEL_TIME_SECS: u64 = 5_400;
pub const MIN_MAX_TRAVEL_TIME_SECS: u64 = 60;
pub const MAX_MAX_TRAVEL_TIME_SECS: u64 = 86_400;

/// Minimum spacing between two arrivals on the same target, in seconds.
pub const DEFAULT_MIN_ATTACK_INTERVAL_SECS: u64 = 60;
pub const MIN_MIN_ATTACK_INTERVAL_SECS: u64 = 0;
pub const MAX_MIN_ATTACK_INTERVAL_SECS: u64 = 3_600;

// =============================================================================
// Targets
// =============================================================================

/// Maximum number of targets kept per Farmer.
pub const DEFAULT_TARGETS_PER_VILLAGE: usize = 150;
pub const MIN_TARGETS_PER_VILLAGE: usize = 1;
pub const MAX_TARGETS_PER_VILLAGE: usize = 1_000;

/// Distance bounds in fields.
pub const DEFAULT_MIN_DISTANCE: f64 = 0.0;
pub const DEFAULT_MAX_DISTANCE: f64 = 15.0;
pub const MIN_DISTANCE_BOUND: f64 = 0.0;
pub const MAX_DISTANCE_BOUND: f64 = 500.0;

/// Point bounds of an acceptable target.
pub const DEFAULT_MIN_POINTS: u32 = 0;
pub const DEFAULT_MAX_POINTS: u32 = 12_500;
pub const MIN_POINTS_BOUND: u32 = 0;
pub const MAX_POINTS_BOUND: u32 = 15_000;

// =============================================================================
// Events
// =============================================================================

/// Maximum number of retained log entries.
pub const DEFAULT_EVENT_LOG_CAPACITY: usize = 1_000;
pub const MIN_EVENT_LOG_CAPACITY: usize = 10;
pub const MAX_EVENT_LOG_CAPACITY: usize = 10_000;

/// Clamps a setting into `[min, max]` and logs a warning if it was changed.
pub(crate) fn clamp_setting<T>(name: &str, value: T, min: T, max: T) -> T
where
    T: PartialOrd + Copy + Display,
{
    if value < min {
        tracing::warn!(
            setting = name,
            requested = %value,
            min = %min,
            max = %max,
            "{} below minimum, clamping to {}",
            name,
            min
        );
        min
    } else if value > max {
        tracing::warn!(
            setting = name,
            requested = %value,
            min = %min,
            max = %max,
            "{} above maximum, clamping to {}",
            name,
            max
        );
        max
    } else {
        value
    }
}
