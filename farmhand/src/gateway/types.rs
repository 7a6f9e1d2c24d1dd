//! Data exchanged with collaborators.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::target::{Coord, GroupId, PlayerId, TargetId, VillageId};

/// An owned village, the origin of a Farmer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Village {
    pub id: VillageId,
    pub name: String,
    pub coord: Coord,
    pub owner: PlayerId,
    /// Groups the village belongs to, for village-scope filters.
    #[serde(default)]
    pub groups: Vec<GroupId>,
}

/// Resource stocks of a village.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    pub wood: u64,
    pub clay: u64,
    pub iron: u64,
}

impl Resources {
    pub const fn new(wood: u64, clay: u64, iron: u64) -> Self {
        Self { wood, clay, iron }
    }

    /// Returns true if every stock is at or above `capacity`.
    pub fn is_full(&self, capacity: u64) -> bool {
        self.wood >= capacity && self.clay >= capacity && self.iron >= capacity
    }
}

/// An action leaving a village, as reported by the village collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingAction {
    pub target: TargetId,
    /// Time until the action reaches its target.
    pub arrival_in: Duration,
    /// Time until the action is back home.
    pub return_in: Duration,
}

/// Current state of an owned village.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VillageState {
    /// Actions currently outstanding from this village.
    pub outstanding_actions: u32,
    pub resources: Resources,
    pub storage_capacity: u64,
    /// Outgoing actions, valid only when `actions_known` is set.
    #[serde(default)]
    pub outgoing: Vec<OutgoingAction>,
    /// Whether `outgoing` is the complete list of this village's actions.
    #[serde(default)]
    pub actions_known: bool,
}

/// A named army template the dispatch collaborator can send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loadout {
    pub name: String,
    /// Unit type to count.
    pub units: BTreeMap<String, u32>,
    /// Carry capacity of the whole loadout.
    pub payload: u32,
}

impl Loadout {
    pub fn new(name: impl Into<String>, payload: u32) -> Self {
        Self {
            name: name.into(),
            units: BTreeMap::new(),
            payload,
        }
    }

    /// Adds `count` units of `unit` to this loadout.
    pub fn with_units(mut self, unit: impl Into<String>, count: u32) -> Self {
        self.units.insert(unit.into(), count);
        self
    }
}

/// Answer of a sufficiency check for one loadout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sufficiency {
    /// The village has the units for this loadout right now.
    pub sufficient: bool,
    /// One-way travel time to the target.
    pub travel_time: Duration,
}

/// An action heading to a target, as reported authoritatively by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingAction {
    pub source: VillageId,
    /// Predicted time until arrival.
    pub arrival_in: Duration,
}
