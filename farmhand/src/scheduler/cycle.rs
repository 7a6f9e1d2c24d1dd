//! Cycle scheduler state and the `advance` step.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::reload::{could_reference, ReloadPlan, ReloadWatch};
use super::EMPTY_CYCLE_BACKOFF;
use crate::engine::EngineError;
use crate::events::FarmEvent;
use crate::farmer::{FarmContext, Farmer, FarmerSnapshot, FarmerStatus};
use crate::gateway::{Loadout, Village};
use crate::target::VillageId;

/// Why [`CycleScheduler::run`] returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerExit {
    /// The interrupt token was cancelled.
    Interrupted,
    /// A Farmer stopped with `user_stop`; scheduling halts.
    UserStop,
    /// The engine cannot farm at all.
    Halted(EngineError),
}

#[derive(Debug, Default)]
struct CycleState {
    farmers: Vec<Arc<Farmer>>,
    /// Active Farmer; equal to `farmers.len()` once a pass is done.
    index: usize,
    /// Set while waiting out the pause between passes.
    next_cycle_at: Option<DateTime<Utc>>,
    /// A pass has begun and not yet ended.
    in_cycle: bool,
    completed_cycles: u64,
}

/// Read-only view of the scheduler, usable while it runs.
#[derive(Debug, Clone)]
pub struct SchedulerView {
    state: Arc<Mutex<CycleState>>,
}

impl SchedulerView {
    pub fn index(&self) -> usize {
        self.state.lock().index
    }

    pub fn len(&self) -> usize {
        self.state.lock().farmers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn next_cycle_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().next_cycle_at
    }

    /// Number of passes that reached the end of the Farmer list.
    pub fn completed_cycles(&self) -> u64 {
        self.state.lock().completed_cycles
    }

    pub fn farmers(&self) -> Vec<Arc<Farmer>> {
        self.state.lock().farmers.clone()
    }

    pub fn farmer_snapshots(&self) -> Vec<FarmerSnapshot> {
        self.farmers().iter().map(|f| f.snapshot()).collect()
    }
}

/// Owns the Farmer collection and rotates through it.
pub struct CycleScheduler {
    ctx: FarmContext,
    state: Arc<Mutex<CycleState>>,
    loadouts: Vec<Loadout>,
    reload: ReloadWatch,
}

impl CycleScheduler {
    /// Creates a scheduler whose first `advance` loads everything.
    pub fn new(ctx: FarmContext) -> Self {
        let reload = ReloadWatch {
            settings: ctx.settings.subscribe(),
            groups: ctx.collaborators.exception_groups.subscribe(),
            exceptions: ctx.exceptions.subscribe(),
            plan: ReloadPlan::full(),
        };
        Self {
            ctx,
            state: Arc::new(Mutex::new(CycleState::default())),
            loadouts: Vec::new(),
            reload,
        }
    }

    /// Installs the initial village list.
    ///
    /// The exception registry must already hold the current groups; the
    /// first pass then skips reloading both.
    pub fn prime(&mut self, villages: Vec<Village>) {
        self.rebuild_farmers(villages);
        self.reload.plan.villages = false;
        self.reload.plan.exception_groups = false;
    }

    pub fn view(&self) -> SchedulerView {
        SchedulerView {
            state: Arc::clone(&self.state),
        }
    }

    pub fn index(&self) -> usize {
        self.state.lock().index
    }

    pub fn next_cycle_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().next_cycle_at
    }

    pub fn farmers(&self) -> Vec<Arc<Farmer>> {
        self.state.lock().farmers.clone()
    }

    /// Advances until interrupted, user-stopped or halted.
    pub async fn run(&mut self, interrupt: &CancellationToken) -> SchedulerExit {
        loop {
            if interrupt.is_cancelled() {
                return SchedulerExit::Interrupted;
            }
            if let Some(exit) = self.advance(interrupt).await {
                return exit;
            }
        }
    }

    /// Runs the Farmer at the current index, or closes the pass and opens
    /// the next one when the index is past the end. The first call opens
    /// the first pass.
    ///
    /// Returns `Some` when scheduling must stop.
    pub async fn advance(&mut self, interrupt: &CancellationToken) -> Option<SchedulerExit> {
        self.ctx.progress.touch();
        self.forward_exception_changes();

        let (index, len, in_cycle) = {
            let state = self.state.lock();
            (state.index, state.farmers.len(), state.in_cycle)
        };

        if !in_cycle || index >= len {
            if in_cycle {
                if let Some(exit) = self.end_cycle(len, interrupt).await {
                    return Some(exit);
                }
            }
            return self.begin_cycle().await;
        }

        let farmer = Arc::clone(&self.state.lock().farmers[index]);
        if let Err(e) = farmer.init(&self.ctx).await {
            warn!(village = %farmer.id(), error = %e, "Farmer init failed");
        }

        let run = farmer.run(&self.ctx, &self.loadouts);
        tokio::pin!(run);
        let finished = tokio::select! {
            biased;
            _ = interrupt.cancelled() => None,
            reason = &mut run => Some(reason),
        };
        let Some(reason) = finished else {
            farmer.stop(FarmerStatus::UserStop);
            run.await;
            return Some(SchedulerExit::Interrupted);
        };

        if reason == Some(FarmerStatus::UserStop) {
            info!(village = %farmer.id(), "Farmer user-stopped, scheduling halted");
            return Some(SchedulerExit::UserStop);
        }

        let mut state = self.state.lock();
        state.index = (state.index + 1).min(state.farmers.len());
        None
    }

    /// Stops every running Farmer with `user_stop` and clears the
    /// next-cycle timestamp.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        for farmer in state.farmers.iter().filter(|f| f.is_running()) {
            farmer.stop(FarmerStatus::UserStop);
        }
        state.next_cycle_at = None;
    }

    // =========================================================================
    // Cycle boundaries
    // =========================================================================

    async fn end_cycle(
        &mut self,
        len: usize,
        interrupt: &CancellationToken,
    ) -> Option<SchedulerExit> {
        let mut pause = self.ctx.settings.snapshot().cycle_pause();
        if len == 0 {
            pause = pause.max(EMPTY_CYCLE_BACKOFF);
        }
        let next_cycle_at =
            Utc::now() + chrono::Duration::from_std(pause).unwrap_or_else(|_| chrono::Duration::zero());

        {
            let mut state = self.state.lock();
            state.index = 0;
            state.in_cycle = false;
            state.next_cycle_at = Some(next_cycle_at);
            state.completed_cycles += 1;
        }
        self.ctx.sink.emit(FarmEvent::CycleEnd { next_cycle_at });

        tokio::select! {
            biased;
            _ = interrupt.cancelled() => return Some(SchedulerExit::Interrupted),
            _ = tokio::time::sleep(pause) => {}
        }

        self.state.lock().next_cycle_at = None;
        None
    }

    async fn begin_cycle(&mut self) -> Option<SchedulerExit> {
        self.forward_exception_changes();
        if self.reload.plan.exception_groups && self.refresh_exception_groups().await {
            self.reload.plan.exception_groups = false;
            self.forward_exception_changes();
        }
        self.apply_pending().await;

        match self.ctx.collaborators.actions.loadouts().await {
            Ok(loadouts) if loadouts.is_empty() => {
                return Some(SchedulerExit::Halted(EngineError::NoLoadouts));
            }
            Ok(loadouts) => self.loadouts = loadouts,
            Err(e) if self.loadouts.is_empty() => {
                return Some(SchedulerExit::Halted(e.into()));
            }
            Err(e) => warn!(error = %e, "Loadout refresh failed, keeping previous loadouts"),
        }

        let farmers = {
            let mut state = self.state.lock();
            state.index = 0;
            state.in_cycle = true;
            state.next_cycle_at = None;
            state.farmers.len()
        };
        self.ctx.sink.emit(FarmEvent::CycleBegin { farmers });
        None
    }

    /// Returns false if the groups could not be fetched.
    async fn refresh_exception_groups(&self) -> bool {
        match self.ctx.collaborators.exception_groups.current().await {
            Ok(sets) => {
                self.ctx.exceptions.replace_all(sets);
                true
            }
            Err(e) => {
                warn!(error = %e, "Exception group refresh failed");
                false
            }
        }
    }

    /// Applies the pending reload plan. Only called between passes.
    ///
    /// The plan stays pending until the village list is in hand, so a pass
    /// abandoned during the reload retries it at the next boundary. A failed
    /// village reload also stays pending.
    async fn apply_pending(&mut self) {
        if self.reload.plan.is_empty() {
            return;
        }

        let mut villages_pending = false;
        if self.reload.plan.villages {
            match self.ctx.collaborators.villages.owned_villages().await {
                Ok(villages) => self.rebuild_farmers(villages),
                Err(e) => {
                    warn!(error = %e, "Village reload failed, keeping current Farmers");
                    villages_pending = true;
                }
            }
        }

        let plan = self.reload.take();
        self.reload.plan.villages = villages_pending;
        self.reload.plan.exception_groups = plan.exception_groups;
        for farmer in self.farmers() {
            if plan.all_targets || plan.changes.iter().any(|c| could_reference(c, &farmer)) {
                farmer.invalidate();
            }
        }
    }

    /// Replaces the Farmer collection, keeping Farmers of villages that stay.
    fn rebuild_farmers(&mut self, villages: Vec<Village>) {
        let settings = self.ctx.settings.snapshot();
        let mut state = self.state.lock();

        let mut existing: HashMap<VillageId, Arc<Farmer>> = state
            .farmers
            .drain(..)
            .map(|farmer| (farmer.id(), farmer))
            .collect();

        let before = existing.len();
        let next: Vec<Arc<Farmer>> = villages
            .into_iter()
            .filter(|v| settings.admits_village(&v.groups))
            .map(|v| {
                existing
                    .remove(&v.id)
                    .unwrap_or_else(|| Arc::new(Farmer::new(v)))
            })
            .collect();

        debug!(
            before,
            after = next.len(),
            removed = existing.len(),
            "Farmer collection rebuilt"
        );

        self.ctx.ledger.set_villages(next.iter().map(|f| f.id()));
        state.farmers = next;
        state.index = state.index.min(state.farmers.len());
    }

    fn forward_exception_changes(&mut self) {
        for change in self.reload.poll() {
            self.ctx.sink.emit(FarmEvent::ExceptionChanged(change));
        }
    }
}

impl std::fmt::Debug for CycleScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CycleScheduler")
            .field("farmers", &state.farmers.len())
            .field("index", &state.index)
            .field("next_cycle_at", &state.next_cycle_at)
            .finish_non_exhaustive()
    }
}
