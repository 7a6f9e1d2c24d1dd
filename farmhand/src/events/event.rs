//! Event vocabulary emitted by the engine.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::exceptions::ExceptionChange;
use crate::farmer::FarmerStatus;
use crate::target::{ActionId, TargetId, VillageId};

/// Something observable happened in the engine.
#[derive(Clone, Debug, PartialEq)]
pub enum FarmEvent {
    // -------------------------------------------------------------------------
    // Engine lifecycle
    // -------------------------------------------------------------------------
    /// The engine started with this many eligible Farmers.
    EngineStarted { farmers: usize },

    /// The engine was stopped by the operator.
    EngineStopped,

    /// The engine stopped itself because it cannot operate at all.
    EngineHalted { reason: String },

    /// The watchdog restarted the engine after a stall.
    EngineRestarted { stalled_for: Duration, restarts: u64 },

    // -------------------------------------------------------------------------
    // Cycle lifecycle
    // -------------------------------------------------------------------------
    /// A pass over every Farmer began.
    CycleBegin { farmers: usize },

    /// A pass finished; the next one starts at `next_cycle_at`.
    CycleEnd { next_cycle_at: DateTime<Utc> },

    // -------------------------------------------------------------------------
    // Farmer lifecycle
    // -------------------------------------------------------------------------
    FarmerStart { village: VillageId },

    FarmerStop {
        village: VillageId,
        reason: FarmerStatus,
    },

    /// A pipeline step resolved to a status.
    StepStatus {
        village: VillageId,
        target: Option<TargetId>,
        status: FarmerStatus,
    },

    /// The dispatch collaborator confirmed an action.
    ActionDispatched {
        village: VillageId,
        target: TargetId,
        action: ActionId,
    },

    // -------------------------------------------------------------------------
    // Exceptions
    // -------------------------------------------------------------------------
    ExceptionChanged(ExceptionChange),
}

impl FarmEvent {
    /// Village this event concerns, if any.
    pub fn village(&self) -> Option<VillageId> {
        match self {
            Self::FarmerStart { village }
            | Self::FarmerStop { village, .. }
            | Self::StepStatus { village, .. }
            | Self::ActionDispatched { village, .. } => Some(*village),
            _ => None,
        }
    }

    /// Target this event concerns, if any.
    pub fn target(&self) -> Option<TargetId> {
        match self {
            Self::StepStatus { target, .. } => *target,
            Self::ActionDispatched { target, .. } => Some(*target),
            Self::ExceptionChanged(change) => Some(change.target),
            _ => None,
        }
    }

    /// Short name of the event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::EngineStarted { .. } => "engine_started",
            Self::EngineStopped => "engine_stopped",
            Self::EngineHalted { .. } => "engine_halted",
            Self::EngineRestarted { .. } => "engine_restarted",
            Self::CycleBegin { .. } => "cycle_begin",
            Self::CycleEnd { .. } => "cycle_end",
            Self::FarmerStart { .. } => "farmer_start",
            Self::FarmerStop { .. } => "farmer_stop",
            Self::StepStatus { .. } => "step_status",
            Self::ActionDispatched { .. } => "action_dispatched",
            Self::ExceptionChanged(_) => "exception_changed",
        }
    }
}
