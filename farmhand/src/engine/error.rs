//! Engine-level errors.

use thiserror::Error;

use crate::gateway::GatewayError;

/// Errors that escape the engine to its caller.
///
/// Everything a single Farmer step can run into is a `FarmerStatus`, not an
/// error; only faults that stop the whole engine end up here.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("farming engine is already running")]
    AlreadyRunning,

    /// No loadout is configured, so nothing can ever be sent.
    #[error("no loadouts available")]
    NoLoadouts,

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
