//! Identity and geometry types shared across the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            /// Returns the raw numeric value.
            pub fn get(self) -> u32 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl From<u32> for $name {
            fn from(value: u32) -> Self {
                Self(value)
            }
        }
    };
}

numeric_id!(
    /// Identifier of a target (a village that can be farmed).
    TargetId,
    "t"
);
numeric_id!(
    /// Identifier of an owned village; a Farmer is keyed by it.
    VillageId,
    "v"
);
numeric_id!(
    /// Identifier of a player (village owner).
    PlayerId,
    "p"
);
numeric_id!(
    /// Identifier of a village group, used for village-scope filters.
    GroupId,
    "g"
);

/// Identifier assigned by the dispatch collaborator to a sent action.
#[derive(Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(String);

impl ActionId {
    /// Creates an action id from the collaborator's value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the string value of this id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActionId({})", self.0)
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Map position on the game grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.x, self.y)
    }
}

/// Straight-line distance between two grid positions.
pub fn euclidean(a: Coord, b: Coord) -> f64 {
    let dx = f64::from(a.x - b.x);
    let dy = f64::from(a.y - b.y);
    (dx * dx + dy * dy).sqrt()
}

/// A candidate destination for a farming action.
///
/// Targets are immutable snapshots taken when a Farmer loads its list;
/// `distance` is relative to the origin used for that load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub id: TargetId,
    pub coord: Coord,
    /// Owning player, `None` for unclaimed (barbarian) villages.
    pub owner: Option<PlayerId>,
    /// Tribe/allegiance of the owner, if any.
    pub allegiance: Option<u32>,
    pub points: u32,
    /// Distance from the origin of the last `compute_distances` call.
    #[serde(default)]
    pub distance: f64,
}

impl Target {
    /// Creates an unclaimed target with no distance attached.
    pub fn unclaimed(id: impl Into<TargetId>, coord: Coord, points: u32) -> Self {
        Self {
            id: id.into(),
            coord,
            owner: None,
            allegiance: None,
            points,
            distance: 0.0,
        }
    }

    /// Sets the owner of this target.
    pub fn with_owner(mut self, owner: PlayerId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Returns true if no player owns this target.
    pub fn is_unclaimed(&self) -> bool {
        self.owner.is_none()
    }
}

/// Authoritative, freshly fetched state of a target (pipeline step 5).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetState {
    pub owner: Option<PlayerId>,
    pub points: u32,
    /// Beginner/noble protection flag.
    pub protected: bool,
}
