//! Exception registry: included and ignored target ids plus their audit trail.
//!
//! Sets are published copy-on-write. [`ExceptionRegistry::snapshot`] hands out
//! an `Arc` of the current sets, and writers build a new set and swap it in,
//! so a Farmer iterating a snapshot is never invalidated mid-step.

mod registry;

pub use registry::{
    AuditEntry, ExceptionChange, ExceptionChangeKind, ExceptionRegistry, ExceptionSet,
    ExceptionSets, DEFAULT_CHANGE_CHANNEL_CAPACITY,
};
