//! Setting key access and validation.
//!
//! This is the synchronous key-value view over [`FarmSettings`]: every key
//! maps to one field, parses its value, and clamps on write.

use std::fmt::Display;
use std::str::FromStr;

use thiserror::Error;

use super::settings::FarmSettings;
use crate::target::GroupId;

/// Errors that can occur when getting or setting values by key.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingKeyError {
    /// Unknown setting key.
    #[error("Unknown setting key '{0}'")]
    UnknownKey(String),

    /// The value could not be parsed for this key.
    #[error("Invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Supported setting keys, written as `section.key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    // Timing
    PacingIntervalMs,
    CyclePauseSecs,
    StepTimeoutSecs,

    // Commands
    CommandCeiling,
    ReservedCommandSlots,
    MaxTravelTimeSecs,
    MinAttackIntervalSecs,

    // Targets
    TargetsPerVillage,
    MinDistance,
    MaxDistance,
    MinPoints,
    MaxPoints,

    // Policy
    CheckFullStorage,
    AllowMultipleFarmers,
    SingleAttack,

    // Villages
    IncludeVillageGroup,
    ExcludeVillageGroup,

    // Events
    EventLogCapacity,
}

impl FromStr for SettingKey {
    type Err = SettingKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| SettingKeyError::UnknownKey(s.to_string()))
    }
}

impl SettingKey {
    /// Returns every key in display order.
    pub fn all() -> &'static [SettingKey] {
        &[
            SettingKey::PacingIntervalMs,
            SettingKey::CyclePauseSecs,
            SettingKey::StepTimeoutSecs,
            SettingKey::CommandCeiling,
            SettingKey::ReservedCommandSlots,
            SettingKey::MaxTravelTimeSecs,
            SettingKey::MinAttackIntervalSecs,
            SettingKey::TargetsPerVillage,
            SettingKey::MinDistance,
            SettingKey::MaxDistance,
            SettingKey::MinPoints,
            SettingKey::MaxPoints,
            SettingKey::CheckFullStorage,
            SettingKey::AllowMultipleFarmers,
            SettingKey::SingleAttack,
            SettingKey::IncludeVillageGroup,
            SettingKey::ExcludeVillageGroup,
            SettingKey::EventLogCapacity,
        ]
    }

    /// Returns the full `section.key` name.
    pub fn name(&self) -> &'static str {
        match self {
            SettingKey::PacingIntervalMs => "timing.pacing_interval_ms",
            SettingKey::CyclePauseSecs => "timing.cycle_pause_secs",
            SettingKey::StepTimeoutSecs => "timing.step_timeout_secs",
            SettingKey::CommandCeiling => "commands.ceiling",
            SettingKey::ReservedCommandSlots => "commands.reserved_slots",
            SettingKey::MaxTravelTimeSecs => "commands.max_travel_time_secs",
            SettingKey::MinAttackIntervalSecs => "commands.min_attack_interval_secs",
            SettingKey::TargetsPerVillage => "targets.per_village",
            SettingKey::MinDistance => "targets.min_distance",
            SettingKey::MaxDistance => "targets.max_distance",
            SettingKey::MinPoints => "targets.min_points",
            SettingKey::MaxPoints => "targets.max_points",
            SettingKey::CheckFullStorage => "policy.check_full_storage",
            SettingKey::AllowMultipleFarmers => "policy.allow_multiple_farmers",
            SettingKey::SingleAttack => "policy.single_attack",
            SettingKey::IncludeVillageGroup => "villages.include_group",
            SettingKey::ExcludeVillageGroup => "villages.exclude_group",
            SettingKey::EventLogCapacity => "events.log_capacity",
        }
    }

    /// Returns the INI section of this key.
    pub fn section(&self) -> &'static str {
        self.split().0
    }

    /// Returns the key name within its section.
    pub fn field(&self) -> &'static str {
        self.split().1
    }

    fn split(&self) -> (&'static str, &'static str) {
        self.name().split_once('.').unwrap_or(("", self.name()))
    }

    /// Reads the current value as a string (empty when unset).
    pub fn get(&self, settings: &FarmSettings) -> String {
        match self {
            SettingKey::PacingIntervalMs => settings.pacing_interval_ms.to_string(),
            SettingKey::CyclePauseSecs => settings.cycle_pause_secs.to_string(),
            SettingKey::StepTimeoutSecs => settings.step_timeout_secs.to_string(),
            SettingKey::CommandCeiling => settings.command_ceiling.to_string(),
            SettingKey::ReservedCommandSlots => settings.reserved_command_slots.to_string(),
            SettingKey::MaxTravelTimeSecs => settings.max_travel_time_secs.to_string(),
            SettingKey::MinAttackIntervalSecs => settings.min_attack_interval_secs.to_string(),
            SettingKey::TargetsPerVillage => settings.targets_per_village.to_string(),
            SettingKey::MinDistance => settings.min_distance.to_string(),
            SettingKey::MaxDistance => settings.max_distance.to_string(),
            SettingKey::MinPoints => settings.min_points.to_string(),
            SettingKey::MaxPoints => settings.max_points.to_string(),
            SettingKey::CheckFullStorage => settings.check_full_storage.to_string(),
            SettingKey::AllowMultipleFarmers => settings.allow_multiple_farmers.to_string(),
            SettingKey::SingleAttack => settings.single_attack.to_string(),
            SettingKey::IncludeVillageGroup => group_string(settings.include_village_group),
            SettingKey::ExcludeVillageGroup => group_string(settings.exclude_village_group),
            SettingKey::EventLogCapacity => settings.event_log_capacity.to_string(),
        }
    }

    /// Parses `value`, writes it, and re-clamps the settings.
    pub fn set(&self, settings: &mut FarmSettings, value: &str) -> Result<(), SettingKeyError> {
        let value = value.trim();
        match self {
            SettingKey::PacingIntervalMs => settings.pacing_interval_ms = self.parse(value)?,
            SettingKey::CyclePauseSecs => settings.cycle_pause_secs = self.parse(value)?,
            SettingKey::StepTimeoutSecs => settings.step_timeout_secs = self.parse(value)?,
            SettingKey::CommandCeiling => settings.command_ceiling = self.parse(value)?,
            SettingKey::ReservedCommandSlots => {
                settings.reserved_command_slots = self.parse(value)?
            }
            SettingKey::MaxTravelTimeSecs => settings.max_travel_time_secs = self.parse(value)?,
            SettingKey::MinAttackIntervalSecs => {
                settings.min_attack_interval_secs = self.parse(value)?
            }
            SettingKey::TargetsPerVillage => settings.targets_per_village = self.parse(value)?,
            SettingKey::MinDistance => settings.min_distance = self.parse_finite(value)?,
            SettingKey::MaxDistance => settings.max_distance = self.parse_finite(value)?,
            SettingKey::MinPoints => settings.min_points = self.parse(value)?,
            SettingKey::MaxPoints => settings.max_points = self.parse(value)?,
            SettingKey::CheckFullStorage => settings.check_full_storage = self.parse_bool(value)?,
            SettingKey::AllowMultipleFarmers => {
                settings.allow_multiple_farmers = self.parse_bool(value)?
            }
            SettingKey::SingleAttack => settings.single_attack = self.parse_bool(value)?,
            SettingKey::IncludeVillageGroup => {
                settings.include_village_group = self.parse_group(value)?
            }
            SettingKey::ExcludeVillageGroup => {
                settings.exclude_village_group = self.parse_group(value)?
            }
            SettingKey::EventLogCapacity => settings.event_log_capacity = self.parse(value)?,
        }
        *settings = std::mem::take(settings).clamped();
        Ok(())
    }

    fn invalid(&self, value: &str, reason: impl Display) -> SettingKeyError {
        SettingKeyError::InvalidValue {
            key: self.name().to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    fn parse<T>(&self, value: &str) -> Result<T, SettingKeyError>
    where
        T: FromStr,
        T::Err: Display,
    {
        value.parse().map_err(|e| self.invalid(value, e))
    }

    fn parse_finite(&self, value: &str) -> Result<f64, SettingKeyError> {
        let parsed: f64 = self.parse(value)?;
        if parsed.is_finite() {
            Ok(parsed)
        } else {
            Err(self.invalid(value, "must be a finite number"))
        }
    }

    fn parse_bool(&self, value: &str) -> Result<bool, SettingKeyError> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(self.invalid(value, "expected true or false")),
        }
    }

    fn parse_group(&self, value: &str) -> Result<Option<GroupId>, SettingKeyError> {
        if value.is_empty() || value.eq_ignore_ascii_case("none") {
            return Ok(None);
        }
        self.parse::<u32>(value).map(|id| Some(GroupId(id)))
    }
}

fn group_string(group: Option<GroupId>) -> String {
    group.map(|g| g.get().to_string()).unwrap_or_default()
}
