//! Settings structs.
//!
//! [`FarmSettings`] is the validated configuration read by every Farmer step.
//! [`ConfigFile`] groups it with logging settings for the INI file.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::defaults::*;
use crate::target::GroupId;

/// Farming parameters. Numeric fields are clamped by [`FarmSettings::clamped`],
/// which every write path goes through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmSettings {
    /// Base pacing delay between actions (randomized ±50%).
    pub pacing_interval_ms: u64,
    /// Pause after a full pass over every Farmer.
    pub cycle_pause_secs: u64,
    /// Bound on one pipeline step; exceeding it yields `expired_step`.
    pub step_timeout_secs: u64,
    /// Outstanding-action ceiling per village.
    pub command_ceiling: u32,
    /// Slots subtracted from the ceiling and left for manual use.
    pub reserved_command_slots: u32,
    /// Round-trip transit limit for a chosen loadout.
    pub max_travel_time_secs: u64,
    /// Minimum spacing between arrivals on the same target.
    pub min_attack_interval_secs: u64,
    /// Maximum length of a Farmer's target list.
    pub targets_per_village: usize,
    pub min_distance: f64,
    pub max_distance: f64,
    pub min_points: u32,
    pub max_points: u32,
    /// Maximum number of entries kept by the event log.
    pub event_log_capacity: usize,
    /// Stop a Farmer when every resource stock is at capacity.
    pub check_full_storage: bool,
    /// Let several villages farm the same target concurrently.
    pub allow_multiple_farmers: bool,
    /// Allow a single in-flight action per target across all villages.
    pub single_attack: bool,
    /// Only villages in this group get a Farmer.
    pub include_village_group: Option<GroupId>,
    /// Villages in this group never get a Farmer.
    pub exclude_village_group: Option<GroupId>,
}

impl Default for FarmSettings {
    fn default() -> Self {
        Self {
            pacing_interval_ms: DEFAULT_PACING_INTERVAL_MS,
            cycle_pause_secs: DEFAULT_CYCLE_PAUSE_SECS,
            step_timeout_secs: DEFAULT_STEP_TIMEOUT_SECS,
            command_ceiling: DEFAULT_COMMAND_CEILING,
            reserved_command_slots: DEFAULT_RESERVED_COMMAND_SLOTS,
            max_travel_time_secs: DEFAULT_MAX_TRAVEL_TIME_SECS,
            min_attack_interval_secs: DEFAULT_MIN_ATTACK_INTERVAL_SECS,
            targets_per_village: DEFAULT_TARGETS_PER_VILLAGE,
            min_distance: DEFAULT_MIN_DISTANCE,
            max_distance: DEFAULT_MAX_DISTANCE,
            min_points: DEFAULT_MIN_POINTS,
            max_points: DEFAULT_MAX_POINTS,
            event_log_capacity: DEFAULT_EVENT_LOG_CAPACITY,
            check_full_storage: true,
            allow_multiple_farmers: false,
            single_attack: true,
            include_village_group: None,
            exclude_village_group: None,
        }
    }
}

impl FarmSettings {
    /// Returns a copy with every numeric field clamped to its bounds.
    ///
    /// Inverted ranges are collapsed: `max_distance` is raised to
    /// `min_distance` and `max_points` to `min_points`.
    pub fn clamped(mut self) -> Self {
        self.pacing_interval_ms = clamp_setting(
            "pacing_interval_ms",
            self.pacing_interval_ms,
            MIN_PACING_INTERVAL_MS,
            MAX_PACING_INTERVAL_MS,
        );
        self.cycle_pause_secs = clamp_setting(
            "cycle_pause_secs",
            self.cycle_pause_secs,
            MIN_CYCLE_PAUSE_SECS,
            MAX_CYCLE_PAUSE_SECS,
        );
        self.step_timeout_secs = clamp_setting(
            "step_timeout_secs",
            self.step_timeout_secs,
            MIN_STEP_TIMEOUT_SECS,
            MAX_STEP_TIMEOUT_SECS,
        );
        self.command_ceiling = clamp_setting(
            "command_ceiling",
            self.command_ceiling,
            MIN_COMMAND_CEILING,
            MAX_COMMAND_CEILING,
        );
        self.reserved_command_slots = clamp_setting(
            "reserved_command_slots",
            self.reserved_command_slots,
            MIN_RESERVED_COMMAND_SLOTS,
            MAX_RESERVED_COMMAND_SLOTS,
        );
        self.max_travel_time_secs = clamp_setting(
            "max_travel_time_secs",
            self.max_travel_time_secs,
            MIN_MAX_TRAVEL_TIME_SECS,
            MAX_MAX_TRAVEL_TIME_SECS,
        );
        self.min_attack_interval_secs = clamp_setting(
            "min_attack_interval_secs",
            self.min_attack_interval_secs,
            MIN_MIN_ATTACK_INTERVAL_SECS,
            MAX_MIN_ATTACK_INTERVAL_SECS,
        );
        self.targets_per_village = clamp_setting(
            "targets_per_village",
            self.targets_per_village,
            MIN_TARGETS_PER_VILLAGE,
            MAX_TARGETS_PER_VILLAGE,
        );
        self.min_distance = clamp_setting(
            "min_distance",
            self.min_distance,
            MIN_DISTANCE_BOUND,
            MAX_DISTANCE_BOUND,
        );
        self.max_distance = clamp_setting(
            "max_distance",
            self.max_distance,
            self.min_distance,
            MAX_DISTANCE_BOUND,
        );
        self.min_points = clamp_setting(
            "min_points",
            self.min_points,
            MIN_POINTS_BOUND,
            MAX_POINTS_BOUND,
        );
        self.max_points = clamp_setting(
            "max_points",
            self.max_points,
            self.min_points,
            MAX_POINTS_BOUND,
        );
        self.event_log_capacity = clamp_setting(
            "event_log_capacity",
            self.event_log_capacity,
            MIN_EVENT_LOG_CAPACITY,
            MAX_EVENT_LOG_CAPACITY,
        );
        self
    }

    /// Base pacing interval as a duration.
    pub fn pacing_interval(&self) -> Duration {
        Duration::from_millis(self.pacing_interval_ms)
    }

    /// Cycle pause as a duration.
    pub fn cycle_pause(&self) -> Duration {
        Duration::from_secs(self.cycle_pause_secs)
    }

    /// Step timeout as a duration.
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }

    /// Number of outstanding actions at which a Farmer stops with `command_limit`.
    pub fn effective_command_limit(&self) -> u32 {
        self.command_ceiling
            .saturating_sub(self.reserved_command_slots)
    }

    /// Watchdog deadline: cycle pause × 1.5 + pacing interval.
    ///
    /// Never shorter than the longest quiet stretch of a healthy Farmer: a
    /// pacing delay at its +50% extreme followed by a full step timeout.
    pub fn stall_threshold(&self) -> Duration {
        let deadline = self.cycle_pause().mul_f64(1.5) + self.pacing_interval();
        let quiet = self.pacing_interval().mul_f64(1.5) + self.step_timeout();
        deadline.max(quiet)
    }

    /// Returns true when the village-scope filters admit a village in `groups`.
    pub fn admits_village(&self, groups: &[GroupId]) -> bool {
        if let Some(excluded) = self.exclude_village_group {
            if groups.contains(&excluded) {
                return false;
            }
        }
        match self.include_village_group {
            Some(included) => groups.contains(&included),
            None => true,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
    /// Enable debug-level logging regardless of RUST_LOG
    pub debug: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            file: super::file::config_directory().join("logs").join("farmhand.log"),
            debug: false,
        }
    }
}

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    /// Farming parameters
    pub farm: FarmSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}
