//! A simulated game world for tests and offline runs.
//!
//! [`SimulatedWorld`] implements every collaborator trait over in-memory
//! state. Travel time is distance × seconds-per-field; units leave on
//! dispatch and come back after the round trip. Calls can be delayed,
//! failed or hung on demand.
//!
//! ```
//! use std::sync::Arc;
//! use farmhand::gateway::Collaborators;
//! use farmhand::sim::{generate_world, WorldSpec};
//!
//! let world = Arc::new(generate_world(&WorldSpec { villages: 2, targets: 20, seed: 7 }));
//! let collaborators = Collaborators::from_world(world);
//! ```

mod generate;
mod world;

pub use generate::{generate_world, WorldSpec, SIM_PLAYER};
pub use world::{DispatchRecord, SimCall, SimFailure, SimulatedWorld, DEFAULT_SECS_PER_FIELD};
