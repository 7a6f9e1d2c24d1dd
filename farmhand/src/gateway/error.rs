//! Collaborator call failures.

use thiserror::Error;

/// Error returned by any collaborator call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// The remote side did not answer in time.
    #[error("collaborator call timed out")]
    Timeout,

    /// The collaborator could not be reached or is not ready.
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    /// The remote side refused the request.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The call was abandoned because the caller stopped.
    #[error("caller stopped")]
    Stopped,
}
