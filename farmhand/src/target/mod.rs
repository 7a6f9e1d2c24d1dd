//! Targets and the pure functions that shape a Farmer's target list.
//!
//! ```
//! use farmhand::target::{compute_distances, euclidean, filter, sort, Coord, FilterRules, Target};
//!
//! let targets = vec![
//!     Target::unclaimed(1, Coord::new(5, 0), 100),
//!     Target::unclaimed(2, Coord::new(2, 0), 100),
//! ];
//! let rules = FilterRules { min_distance: 1.0, max_distance: 10.0, ..Default::default() };
//! let sorted = sort(filter(compute_distances(targets, Coord::new(0, 0), euclidean), &rules));
//! assert_eq!(sorted[0].distance, 2.0);
//! ```

mod filter;
mod types;

pub use filter::{compute_distances, filter, prepare_targets, sort, FilterRules};
pub use types::{
    euclidean, ActionId, Coord, GroupId, PlayerId, Target, TargetId, TargetState, VillageId,
};
