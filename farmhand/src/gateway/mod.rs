//! Contracts of the external collaborators the engine drives.
//!
//! The engine never talks to a game server directly. Target discovery,
//! village state, army sufficiency and action dispatch are all behind the
//! traits in this module, so the engine can run against a live backend or
//! against [`crate::sim::SimulatedWorld`] in tests.

mod error;
mod traits;
mod types;

pub use error::GatewayError;
pub use traits::{
    ActionGateway, BoxFuture, Collaborators, ExceptionGroupSource, TargetSource, VillageSource,
};
pub use types::{
    IncomingAction, Loadout, OutgoingAction, Resources, Sufficiency, Village, VillageState,
};
