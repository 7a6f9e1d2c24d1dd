//! Farmer status values.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Last known status of a Farmer.
///
/// Statuses are outcomes, not errors: every step of the pipeline resolves to
/// one of these, and the terminal ones end the Farmer's turn in the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FarmerStatus {
    /// Idle, waiting for the scheduler to pick it.
    #[default]
    WaitingCycle,
    /// An action was just handed to the dispatch collaborator.
    Attacking,
    /// Target already has an in-flight action the policy forbids duplicating.
    BusyTarget,
    /// No sufficient loadout keeps transit within the travel time cap.
    TimeLimit,
    /// Outstanding actions reached the configured ceiling.
    CommandLimit,
    /// Every tracked resource is at storage capacity.
    FullStorage,
    /// No loadout is sufficient with the units currently home.
    NoUnits,
    /// Target is protected.
    ProtectedVillage,
    /// Target was taken by an unknown owner since the list was loaded.
    AbandonedConquered,
    /// Target points fall outside the allowed range.
    NotAllowedPoints,
    /// Cursor walked past the last target.
    TargetCycleEnd,
    /// Target list is empty.
    NoTargets,
    /// Dispatch or capability call failed.
    CommandError,
    /// A step exceeded the step timeout.
    ExpiredStep,
    /// Stopped by the operator or the engine.
    UserStop,
    Unknown,
}

impl FarmerStatus {
    /// Every status, in declaration order.
    pub const ALL: [FarmerStatus; 16] = [
        FarmerStatus::WaitingCycle,
        FarmerStatus::Attacking,
        FarmerStatus::BusyTarget,
        FarmerStatus::TimeLimit,
        FarmerStatus::CommandLimit,
        FarmerStatus::FullStorage,
        FarmerStatus::NoUnits,
        FarmerStatus::ProtectedVillage,
        FarmerStatus::AbandonedConquered,
        FarmerStatus::NotAllowedPoints,
        FarmerStatus::TargetCycleEnd,
        FarmerStatus::NoTargets,
        FarmerStatus::CommandError,
        FarmerStatus::ExpiredStep,
        FarmerStatus::UserStop,
        FarmerStatus::Unknown,
    ];

    /// Stable snake_case name, as used in logs and serialized output.
    pub fn as_str(&self) -> &'static str {
        match self {
            FarmerStatus::WaitingCycle => "waiting_cycle",
            FarmerStatus::Attacking => "attacking",
            FarmerStatus::BusyTarget => "busy_target",
            FarmerStatus::TimeLimit => "time_limit",
            FarmerStatus::CommandLimit => "command_limit",
            FarmerStatus::FullStorage => "full_storage",
            FarmerStatus::NoUnits => "no_units",
            FarmerStatus::ProtectedVillage => "protected_village",
            FarmerStatus::AbandonedConquered => "abandoned_conquered",
            FarmerStatus::NotAllowedPoints => "not_allowed_points",
            FarmerStatus::TargetCycleEnd => "target_cycle_end",
            FarmerStatus::NoTargets => "no_targets",
            FarmerStatus::CommandError => "command_error",
            FarmerStatus::ExpiredStep => "expired_step",
            FarmerStatus::UserStop => "user_stop",
            FarmerStatus::Unknown => "unknown",
        }
    }

    /// Returns true if this status ends the Farmer's turn in the cycle.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FarmerStatus::TargetCycleEnd
                | FarmerStatus::NoTargets
                | FarmerStatus::FullStorage
                | FarmerStatus::CommandLimit
                | FarmerStatus::NoUnits
                | FarmerStatus::CommandError
                | FarmerStatus::UserStop
        )
    }

    /// Returns true for per-target rejections that advance the cursor and retry.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            FarmerStatus::BusyTarget
                | FarmerStatus::TimeLimit
                | FarmerStatus::ProtectedVillage
                | FarmerStatus::AbandonedConquered
                | FarmerStatus::NotAllowedPoints
        )
    }
}

impl fmt::Display for FarmerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
