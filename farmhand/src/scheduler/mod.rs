//! The cycle scheduler: fair rotation over every Farmer.
//!
//! Only one Farmer runs at a time. When the last Farmer of a pass yields,
//! the scheduler records the next-cycle timestamp, waits out the cycle
//! pause and starts a new pass. Changes to settings, exception sets and
//! village groups are queued and applied at that boundary, so an
//! in-progress pass is never reshuffled.

mod cycle;
mod reload;

pub use cycle::{CycleScheduler, SchedulerExit, SchedulerView};
pub use reload::{could_reference, ReloadPlan};

/// Minimum pause between passes when there is no Farmer at all.
pub const EMPTY_CYCLE_BACKOFF: std::time::Duration = std::time::Duration::from_secs(1);
