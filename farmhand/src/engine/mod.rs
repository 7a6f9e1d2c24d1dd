//! The farming engine: one explicit object per running session.
//!
//! [`FarmEngine`] owns the shared state (settings handle, exception
//! registry, action ledger, progress tracker, event sink) and the injected
//! collaborators. Starting it spawns two tasks:
//!
//! - the supervisor, which owns the [`CycleScheduler`] and restarts it when
//!   the watchdog reports a stall
//! - the [`StallWatchdog`]
//!
//! Several engines can run side by side; nothing is global.
//!
//! [`CycleScheduler`]: crate::scheduler::CycleScheduler
//! [`StallWatchdog`]: crate::watchdog::StallWatchdog

mod error;
mod farm_engine;
mod supervisor;

pub use error::EngineError;
pub use farm_engine::{EngineSnapshot, FarmEngine};
pub use supervisor::RESTART_DELAY;
