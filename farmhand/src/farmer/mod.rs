//! Farmers: one action-issuing state machine per owned village.
//!
//! - [`Farmer`]: target list, cursor and the step pipeline
//! - [`FarmerStatus`]: outcome of every step
//! - [`ActionLedger`]: engine-wide record of in-flight and outstanding actions
//! - [`BusyPolicy`]: whether a target may be attacked again
//! - [`loadout`]: loadout ranking and selection

#[allow(clippy::module_inception)]
mod farmer;
mod ledger;
pub mod loadout;
mod policy;
mod status;

pub use farmer::{FarmContext, Farmer, FarmerSnapshot};
pub use ledger::{ActionLedger, KnownAction};
pub use loadout::Selection;
pub use policy::{BusyPolicy, BusyVerdict};
pub use status::FarmerStatus;
