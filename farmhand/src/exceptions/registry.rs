//! Included/ignored target sets with per-id audit entries.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::target::TargetId;

/// Capacity of the change notification channel.
pub const DEFAULT_CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Which exception set an id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionSet {
    /// Force-eligible even if otherwise filtered.
    Included,
    /// Force-excluded.
    Ignored,
}

impl fmt::Display for ExceptionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExceptionSet::Included => f.write_str("included"),
            ExceptionSet::Ignored => f.write_str("ignored"),
        }
    }
}

/// Whether an id entered or left a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionChangeKind {
    Added,
    Removed,
}

/// Membership change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionChange {
    pub target: TargetId,
    pub set: ExceptionSet,
    pub kind: ExceptionChangeKind,
}

/// Audit record kept for every id that was ever included or ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Last time the id was added to a set.
    pub timestamp: DateTime<Utc>,
    /// Set the id was last added to.
    pub set: ExceptionSet,
    /// Optional summary of the last outcome against this target.
    pub outcome: Option<String>,
}

/// Immutable view of both sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExceptionSets {
    pub included: HashSet<TargetId>,
    pub ignored: HashSet<TargetId>,
}

impl ExceptionSets {
    fn set(&self, which: ExceptionSet) -> &HashSet<TargetId> {
        match which {
            ExceptionSet::Included => &self.included,
            ExceptionSet::Ignored => &self.ignored,
        }
    }

    fn set_mut(&mut self, which: ExceptionSet) -> &mut HashSet<TargetId> {
        match which {
            ExceptionSet::Included => &mut self.included,
            ExceptionSet::Ignored => &mut self.ignored,
        }
    }
}

/// Shared registry of exception sets.
pub struct ExceptionRegistry {
    sets: RwLock<Arc<ExceptionSets>>,
    audit: DashMap<TargetId, AuditEntry>,
    changes: broadcast::Sender<ExceptionChange>,
}

impl ExceptionRegistry {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(DEFAULT_CHANGE_CHANNEL_CAPACITY);
        Self {
            sets: RwLock::new(Arc::new(ExceptionSets::default())),
            audit: DashMap::new(),
            changes,
        }
    }

    /// Returns the current sets. The snapshot never changes after it is taken.
    pub fn snapshot(&self) -> Arc<ExceptionSets> {
        Arc::clone(&self.sets.read())
    }

    /// Force-includes a target. Idempotent; always refreshes the audit entry.
    pub fn include(&self, target: TargetId, outcome: Option<String>) {
        self.add(target, ExceptionSet::Included, outcome);
    }

    /// Force-ignores a target. Idempotent; always refreshes the audit entry.
    pub fn ignore(&self, target: TargetId, outcome: Option<String>) {
        self.add(target, ExceptionSet::Ignored, outcome);
    }

    /// Removes a target from one set. Idempotent; keeps the audit entry.
    pub fn remove(&self, target: TargetId, set: ExceptionSet) {
        let changed = self.mutate(|sets| sets.set_mut(set).remove(&target));
        if changed {
            self.notify(target, set, ExceptionChangeKind::Removed);
        }
    }

    /// Returns true if `target` is currently in `set`.
    pub fn contains(&self, target: TargetId, set: ExceptionSet) -> bool {
        self.snapshot().set(set).contains(&target)
    }

    /// Returns the audit entry of a target, if it was ever added.
    pub fn audit_entry(&self, target: TargetId) -> Option<AuditEntry> {
        self.audit.get(&target).map(|entry| entry.value().clone())
    }

    /// Returns every audit entry, ordered by target id.
    pub fn audit_log(&self) -> Vec<(TargetId, AuditEntry)> {
        let mut entries: Vec<_> = self
            .audit
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        entries.sort_by_key(|(id, _)| *id);
        entries
    }

    /// Records the outcome of the last action against an audited target.
    pub fn record_outcome(&self, target: TargetId, outcome: impl Into<String>) {
        if let Some(mut entry) = self.audit.get_mut(&target) {
            entry.outcome = Some(outcome.into());
        }
    }

    /// Replaces both sets with the ones supplied by the grouping collaborator.
    ///
    /// Emits one change per id that entered or left a set; newly added ids get
    /// an audit entry. The diff is taken against the sets it replaces.
    pub fn replace_all(&self, next: ExceptionSets) {
        let changes = {
            let mut guard = self.sets.write();
            let changes = diff(&guard, &next);
            *guard = Arc::new(next);
            changes
        };

        for (target, set, kind) in changes {
            if kind == ExceptionChangeKind::Added {
                self.touch_audit(target, set, None);
            }
            self.notify(target, set, kind);
        }
    }

    /// Subscribes to membership changes.
    pub fn subscribe(&self) -> broadcast::Receiver<ExceptionChange> {
        self.changes.subscribe()
    }

    fn add(&self, target: TargetId, set: ExceptionSet, outcome: Option<String>) {
        let changed = self.mutate(|sets| sets.set_mut(set).insert(target));
        self.touch_audit(target, set, outcome);
        if changed {
            self.notify(target, set, ExceptionChangeKind::Added);
        }
    }

    /// Copy-and-replace mutation of the published sets.
    fn mutate(&self, f: impl FnOnce(&mut ExceptionSets) -> bool) -> bool {
        let mut guard = self.sets.write();
        let mut next = (**guard).clone();
        let changed = f(&mut next);
        if changed {
            *guard = Arc::new(next);
        }
        changed
    }

    fn touch_audit(&self, target: TargetId, set: ExceptionSet, outcome: Option<String>) {
        let mut entry = self.audit.entry(target).or_insert_with(|| AuditEntry {
            timestamp: Utc::now(),
            set,
            outcome: None,
        });
        entry.timestamp = Utc::now();
        entry.set = set;
        if outcome.is_some() {
            entry.outcome = outcome;
        }
    }

    fn notify(&self, target: TargetId, set: ExceptionSet, kind: ExceptionChangeKind) {
        debug!(target = %target, set = %set, change = ?kind, "Exception set changed");
        // No receivers is fine; nobody is watching yet.
        let _ = self.changes.send(ExceptionChange { target, set, kind });
    }
}

/// Ids that entered or left each set going from `old` to `new`.
fn diff(old: &ExceptionSets, new: &ExceptionSets) -> Vec<(TargetId, ExceptionSet, ExceptionChangeKind)> {
    let mut changes = Vec::new();
    for which in [ExceptionSet::Included, ExceptionSet::Ignored] {
        let (before, after) = (old.set(which), new.set(which));
        changes.extend(
            after
                .difference(before)
                .map(|id| (*id, which, ExceptionChangeKind::Added)),
        );
        changes.extend(
            before
                .difference(after)
                .map(|id| (*id, which, ExceptionChangeKind::Removed)),
        );
    }
    changes
}

impl Default for ExceptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExceptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sets = self.snapshot();
        f.debug_struct("ExceptionRegistry")
            .field("included", &sets.included.len())
            .field("ignored", &sets.ignored.len())
            .finish_non_exhaustive()
    }
}
