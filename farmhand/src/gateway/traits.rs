//! Collaborator traits.
//!
//! Methods return boxed futures so the traits stay object safe and can be
//! shared as `Arc<dyn Trait>` across the engine task.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::watch;

use super::error::GatewayError;
use super::types::{IncomingAction, Loadout, Sufficiency, Village, VillageState};
use crate::exceptions::ExceptionSets;
use crate::target::{euclidean, ActionId, Coord, Target, TargetId, TargetState, VillageId};

/// Boxed, sendable future returned by collaborator calls.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Supplies targets and their authoritative state.
pub trait TargetSource: Send + Sync {
    /// Loads candidate targets around a village.
    fn load_targets<'a>(&'a self, origin: &'a Village)
        -> BoxFuture<'a, Result<Vec<Target>, GatewayError>>;

    /// Fetches the current state of a target; `None` if it no longer exists.
    fn target_state(&self, target: TargetId)
        -> BoxFuture<'_, Result<Option<TargetState>, GatewayError>>;

    /// Distance metric between two map positions.
    fn distance(&self, a: Coord, b: Coord) -> f64 {
        euclidean(a, b)
    }
}

/// Supplies owned villages and their state.
pub trait VillageSource: Send + Sync {
    fn owned_villages(&self) -> BoxFuture<'_, Result<Vec<Village>, GatewayError>>;

    fn village_state(&self, village: VillageId)
        -> BoxFuture<'_, Result<VillageState, GatewayError>>;
}

/// Army sufficiency, authoritative incoming actions and dispatch.
pub trait ActionGateway: Send + Sync {
    /// Idempotently enables the farming capability for a village.
    fn ensure_capability_enabled(&self, village: VillageId)
        -> BoxFuture<'_, Result<(), GatewayError>>;

    /// Available loadouts. An empty list means the engine cannot farm at all.
    fn loadouts(&self) -> BoxFuture<'_, Result<Vec<Loadout>, GatewayError>>;

    /// Checks whether a village can send `loadout` to `target` right now.
    fn check_candidate_sufficiency<'a>(
        &'a self,
        village: VillageId,
        target: &'a Target,
        loadout: &'a Loadout,
    ) -> BoxFuture<'a, Result<Sufficiency, GatewayError>>;

    /// Actions currently heading to `target`, as the server sees them.
    fn incoming_actions(
        &self,
        village: VillageId,
        target: TargetId,
    ) -> BoxFuture<'_, Result<Vec<IncomingAction>, GatewayError>>;

    /// Sends `loadout` from `village` to `target`. Resolves once confirmed.
    fn dispatch_action<'a>(
        &'a self,
        village: VillageId,
        target: &'a Target,
        loadout: &'a Loadout,
    ) -> BoxFuture<'a, Result<ActionId, GatewayError>>;
}

/// Supplies the included/ignored target groups.
pub trait ExceptionGroupSource: Send + Sync {
    fn current(&self) -> BoxFuture<'_, Result<ExceptionSets, GatewayError>>;

    /// Revision counter bumped whenever the groups change.
    fn subscribe(&self) -> watch::Receiver<u64>;
}

/// The set of collaborators an engine is wired to.
#[derive(Clone)]
pub struct Collaborators {
    pub targets: Arc<dyn TargetSource>,
    pub villages: Arc<dyn VillageSource>,
    pub actions: Arc<dyn ActionGateway>,
    pub exception_groups: Arc<dyn ExceptionGroupSource>,
}

impl Collaborators {
    /// Uses one object for every collaborator role.
    pub fn from_world<W>(world: Arc<W>) -> Self
    where
        W: TargetSource + VillageSource + ActionGateway + ExceptionGroupSource + 'static,
    {
        Self {
            targets: world.clone(),
            villages: world.clone(),
            actions: world.clone(),
            exception_groups: world,
        }
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
