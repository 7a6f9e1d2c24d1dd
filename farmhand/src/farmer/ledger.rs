//! Shared record of actions heading to targets.
//!
//! Every Farmer consults the ledger before dispatching. Entries are either
//! in-flight markers (handed to the dispatch collaborator, not yet
//! confirmed) or confirmed actions with a predicted arrival. Entries are
//! dropped once the action is predicted to be back home.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use dashmap::{DashMap, DashSet};
use parking_lot::RwLock;
use tokio::time::Instant;

use crate::gateway::VillageState;
use crate::target::{ActionId, TargetId, VillageId};

/// Longest delay accepted from a collaborator report.
pub const MAX_REPORTED_DELAY: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Returns `now + delay`, with `delay` capped at [`MAX_REPORTED_DELAY`].
pub fn instant_after(now: Instant, delay: Duration) -> Instant {
    now.checked_add(delay.min(MAX_REPORTED_DELAY)).unwrap_or(now)
}

/// An action known to be heading to (or recently at) a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownAction {
    pub source: VillageId,
    pub arrival: Instant,
}

#[derive(Debug, Clone)]
struct LedgerEntry {
    source: VillageId,
    /// `None` while the dispatch is still in flight.
    action: Option<ActionId>,
    arrival: Instant,
    returns: Instant,
}

impl LedgerEntry {
    fn known(&self) -> KnownAction {
        KnownAction {
            source: self.source,
            arrival: self.arrival,
        }
    }
}

/// Engine-wide action ledger.
#[derive(Default)]
pub struct ActionLedger {
    entries: DashMap<TargetId, Vec<LedgerEntry>>,
    /// Villages the engine currently farms from.
    villages: RwLock<HashSet<VillageId>>,
    /// Villages whose outgoing actions were fully reported.
    known: DashSet<VillageId>,
}

impl ActionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the set of villages whose knowledge counts for [`all_known`].
    ///
    /// [`all_known`]: Self::all_known
    pub fn set_villages(&self, villages: impl IntoIterator<Item = VillageId>) {
        *self.villages.write() = villages.into_iter().collect();
    }

    /// Replaces the confirmed actions of `village` with a fresh report.
    ///
    /// In-flight markers of the village are kept.
    pub fn seed_village(&self, village: VillageId, state: &VillageState, now: Instant) {
        self.entries.retain(|_, entries| {
            entries.retain(|e| e.source != village || e.action.is_none());
            !entries.is_empty()
        });

        if !state.actions_known {
            self.known.remove(&village);
            return;
        }

        for outgoing in &state.outgoing {
            self.entries
                .entry(outgoing.target)
                .or_default()
                .push(LedgerEntry {
                    source: village,
                    action: Some(ActionId::new(format!("seeded-{village}-{}", outgoing.target))),
                    arrival: instant_after(now, outgoing.arrival_in),
                    returns: instant_after(now, outgoing.return_in.max(outgoing.arrival_in)),
                });
        }
        self.known.insert(village);
    }

    /// Returns true if every farmed village has fully reported its actions.
    pub fn all_known(&self) -> bool {
        self.villages.read().iter().all(|v| self.known.contains(v))
    }

    /// Places an in-flight marker for `village` against `target`.
    ///
    /// Returns false, leaving the ledger unchanged, if the village already
    /// has a dispatch in flight against that target.
    pub fn mark_in_flight(
        &self,
        village: VillageId,
        target: TargetId,
        travel: Duration,
        now: Instant,
    ) -> bool {
        let mut entries = self.entries.entry(target).or_default();
        if entries
            .iter()
            .any(|e| e.source == village && e.action.is_none())
        {
            return false;
        }
        entries.push(LedgerEntry {
            source: village,
            action: None,
            arrival: instant_after(now, travel),
            returns: instant_after(now, travel.saturating_mul(2)),
        });
        true
    }

    /// Turns the in-flight marker into a confirmed action.
    pub fn confirm(&self, village: VillageId, target: TargetId, action: ActionId) {
        if let Some(mut entries) = self.entries.get_mut(&target) {
            if let Some(entry) = entries
                .iter_mut()
                .find(|e| e.source == village && e.action.is_none())
            {
                entry.action = Some(action);
            }
        }
    }

    /// Removes the in-flight marker after a failed or discarded dispatch.
    pub fn abandon(&self, village: VillageId, target: TargetId) {
        self.entries.remove_if_mut(&target, |_, entries| {
            entries.retain(|e| !(e.source == village && e.action.is_none()));
            entries.is_empty()
        });
    }

    /// Returns true if `village` has a dispatch in flight against `target`.
    pub fn in_flight(&self, village: VillageId, target: TargetId) -> bool {
        self.entries.get(&target).is_some_and(|entries| {
            entries
                .iter()
                .any(|e| e.source == village && e.action.is_none())
        })
    }

    /// Number of unconfirmed dispatches across all targets.
    pub fn in_flight_count(&self) -> usize {
        self.entries
            .iter()
            .map(|entries| entries.iter().filter(|e| e.action.is_none()).count())
            .sum()
    }

    /// Actions still en route to `target`, including in-flight markers.
    pub fn outstanding(&self, target: TargetId, now: Instant) -> Vec<KnownAction> {
        self.entries
            .get(&target)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.action.is_none() || e.arrival > now)
                    .map(LedgerEntry::known)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every remembered action against `target`, arrived or not.
    pub fn recent(&self, target: TargetId, now: Instant) -> Vec<KnownAction> {
        self.prune(now);
        self.entries
            .get(&target)
            .map(|entries| entries.iter().map(LedgerEntry::known).collect())
            .unwrap_or_default()
    }

    /// Drops confirmed actions that are back home.
    pub fn prune(&self, now: Instant) {
        self.entries.retain(|_, entries| {
            entries.retain(|e| e.action.is_none() || e.returns > now);
            !entries.is_empty()
        });
    }

    /// Number of entries, markers included.
    pub fn len(&self) -> usize {
        self.entries.iter().map(|entries| entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ActionLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionLedger")
            .field("targets", &self.entries.len())
            .field("in_flight", &self.in_flight_count())
            .finish_non_exhaustive()
    }
}
