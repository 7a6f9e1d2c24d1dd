//! Pending reloads, collected between cycle boundaries.

use tokio::sync::{broadcast, watch};
use tracing::warn;

use crate::exceptions::{ExceptionChange, ExceptionChangeKind, ExceptionSet};
use crate::farmer::Farmer;
use crate::target::TargetId;

/// What must be reloaded at the next boundary.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReloadPlan {
    /// Rebuild the village list (and therefore the Farmer collection).
    pub villages: bool,
    /// Re-fetch the exception groups from the collaborator.
    pub exception_groups: bool,
    /// Invalidate every Farmer's target list.
    pub all_targets: bool,
    /// Exception changes to apply selectively.
    pub changes: Vec<ExceptionChange>,
}

impl ReloadPlan {
    /// Everything, as on first start.
    pub fn full() -> Self {
        Self {
            villages: true,
            exception_groups: true,
            all_targets: true,
            changes: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Returns true if `change` could alter the target list of `farmer`.
///
/// A target entering the included set or leaving the ignored set may become
/// eligible anywhere; a target entering the ignored set or leaving the
/// included set only matters to lists that hold it.
pub fn could_reference(change: &ExceptionChange, farmer: &Farmer) -> bool {
    match (change.set, change.kind) {
        (ExceptionSet::Included, ExceptionChangeKind::Added)
        | (ExceptionSet::Ignored, ExceptionChangeKind::Removed) => true,
        (ExceptionSet::Ignored, ExceptionChangeKind::Added)
        | (ExceptionSet::Included, ExceptionChangeKind::Removed) => {
            holds(farmer, change.target)
        }
    }
}

fn holds(farmer: &Farmer, target: TargetId) -> bool {
    farmer.targets().iter().any(|t| t.id == target)
}

/// Change subscriptions the scheduler drains at each boundary.
pub(super) struct ReloadWatch {
    pub settings: watch::Receiver<u64>,
    pub groups: watch::Receiver<u64>,
    pub exceptions: broadcast::Receiver<ExceptionChange>,
    pub plan: ReloadPlan,
}

impl ReloadWatch {
    /// Folds every notification received so far into the pending plan.
    ///
    /// Returns the exception changes that arrived since the last poll.
    pub fn poll(&mut self) -> Vec<ExceptionChange> {
        if self.settings.has_changed().unwrap_or(false) {
            let _ = self.settings.borrow_and_update();
            self.plan.villages = true;
            self.plan.all_targets = true;
        }
        if self.groups.has_changed().unwrap_or(false) {
            let _ = self.groups.borrow_and_update();
            self.plan.exception_groups = true;
        }

        let mut arrived = Vec::new();
        loop {
            match self.exceptions.try_recv() {
                Ok(change) => arrived.push(change),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    warn!(missed, "Exception change notifications lagged, reloading all targets");
                    self.plan.all_targets = true;
                }
                Err(_) => break,
            }
        }
        self.plan.changes.extend(arrived.iter().copied());
        arrived
    }

    /// Takes the pending plan, leaving an empty one.
    pub fn take(&mut self) -> ReloadPlan {
        std::mem::take(&mut self.plan)
    }
}
