//! Busy-target policy.
//!
//! Pure decisions over [`KnownAction`] lists; the Farmer gathers the lists
//! from the ledger or from the authoritative remote check.

use std::time::Duration;

use tokio::time::Instant;

use super::ledger::KnownAction;
use crate::config::FarmSettings;
use crate::target::VillageId;

/// Outcome of a busy-ness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyVerdict {
    /// The target may be attacked.
    Clear,
    /// The target must be skipped with `busy_target`.
    Busy,
    /// Local knowledge is incomplete; ask the server.
    Undecided,
}

/// Policy flags read from settings at the start of each step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusyPolicy {
    pub allow_multiple_farmers: bool,
    pub single_attack: bool,
    pub min_attack_interval: Duration,
}

impl BusyPolicy {
    pub fn from_settings(settings: &FarmSettings) -> Self {
        Self {
            allow_multiple_farmers: settings.allow_multiple_farmers,
            single_attack: settings.single_attack,
            min_attack_interval: Duration::from_secs(settings.min_attack_interval_secs),
        }
    }

    /// Decides from actions still en route to the target.
    ///
    /// A same-village duplicate always blocks. With multiple farmers allowed
    /// and complete knowledge, actions from other villages do not block;
    /// otherwise any known action does. Without complete knowledge and no
    /// known action, the decision is deferred.
    pub fn local_verdict(
        &self,
        village: VillageId,
        outstanding: &[KnownAction],
        all_known: bool,
    ) -> BusyVerdict {
        if outstanding.iter().any(|a| a.source == village) {
            return BusyVerdict::Busy;
        }
        if self.allow_multiple_farmers && all_known {
            return BusyVerdict::Clear;
        }
        if !outstanding.is_empty() {
            return BusyVerdict::Busy;
        }
        if all_known {
            BusyVerdict::Clear
        } else {
            BusyVerdict::Undecided
        }
    }

    /// Applies the policy to the server's complete incoming list.
    pub fn remote_verdict(
        &self,
        village: VillageId,
        incoming: &[KnownAction],
        arrival: Instant,
    ) -> BusyVerdict {
        match self.local_verdict(village, incoming, true) {
            BusyVerdict::Clear if self.too_soon(village, incoming, arrival) => BusyVerdict::Busy,
            verdict => verdict,
        }
    }

    /// Returns true if a new action arriving at `arrival` would land within
    /// the minimum interval of a previous one.
    ///
    /// Only this village's actions count, unless multiple farmers are
    /// disabled and single attack is enabled, in which case every village's do.
    pub fn too_soon(&self, village: VillageId, recent: &[KnownAction], arrival: Instant) -> bool {
        let every_village = !self.allow_multiple_farmers && self.single_attack;
        recent
            .iter()
            .filter(|a| every_village || a.source == village)
            .any(|a| abs_diff(a.arrival, arrival) < self.min_attack_interval)
    }
}

fn abs_diff(a: Instant, b: Instant) -> Duration {
    if a > b {
        a - b
    } else {
        b - a
    }
}
