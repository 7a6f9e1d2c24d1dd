//! The per-village Farmer state machine.
//!
//! A Farmer walks its target list one action at a time. [`Farmer::run`] is
//! the driver loop: it starts the Farmer, runs the step pipeline until a
//! terminal status (or [`Farmer::stop`]) ends the turn, and returns the stop
//! reason to the caller.
//!
//! # Step pipeline
//!
//! ```text
//!  Pace ──► Check (steps 2..10, one step timeout) ──► Dispatch ──► Pace
//!             │  reject: advance cursor, Check again
//!             │  expired: Pace
//!             └─ terminal: stop
//! ```

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rand::Rng;
use serde::Serialize;
use tokio::sync::OnceCell;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::ledger::{instant_after, ActionLedger, KnownAction};
use super::loadout::{self, Selection};
use super::policy::{BusyPolicy, BusyVerdict};
use super::status::FarmerStatus;
use crate::config::{FarmSettings, SettingsHandle};
use crate::events::{EventSink, FarmEvent};
use crate::exceptions::ExceptionRegistry;
use crate::gateway::{Collaborators, GatewayError, Loadout, Village};
use crate::target::{prepare_targets, Coord, FilterRules, Target, TargetId, VillageId};
use crate::watchdog::ProgressTracker;

/// Shared engine state every Farmer step reads.
#[derive(Clone)]
pub struct FarmContext {
    pub collaborators: Collaborators,
    pub settings: SettingsHandle,
    pub exceptions: Arc<ExceptionRegistry>,
    pub ledger: Arc<ActionLedger>,
    pub progress: ProgressTracker,
    pub sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for FarmContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FarmContext")
            .field("settings", &self.settings)
            .field("ledger", &self.ledger)
            .finish_non_exhaustive()
    }
}

/// Point-in-time view of a Farmer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FarmerSnapshot {
    pub village: VillageId,
    pub name: String,
    pub status: FarmerStatus,
    pub cursor: usize,
    pub targets: usize,
    pub running: bool,
    pub initialized: bool,
}

struct FarmerState {
    cursor: usize,
    status: FarmerStatus,
    running: bool,
    cancel: CancellationToken,
}

/// One Farmer per owned village.
pub struct Farmer {
    village: Village,
    state: Mutex<FarmerState>,
    /// Replaced wholesale on reload; readers keep their own `Arc`.
    targets: RwLock<Arc<Vec<Target>>>,
    /// Replaced by [`Farmer::invalidate`] to force the next init to reload.
    init: RwLock<Arc<OnceCell<()>>>,
}

/// A target that passed every check, ready to dispatch.
#[derive(Debug)]
struct Plan {
    target: Target,
    loadout: Loadout,
    travel_time: Duration,
}

/// Outcome of the checking steps.
#[derive(Debug)]
enum Checked {
    Ready(Plan),
    /// Skip the current target and check the next one without pacing.
    Reject { status: FarmerStatus, drop: bool },
    /// Re-enter the pipeline after a pacing delay.
    Expired,
    /// End the turn.
    Stop(FarmerStatus),
}

/// Driver phases of the pipeline.
#[derive(Debug)]
enum Phase {
    Pace,
    Check,
    Dispatch(Plan),
}

impl Farmer {
    pub fn new(village: Village) -> Self {
        Self {
            village,
            state: Mutex::new(FarmerState {
                cursor: 0,
                status: FarmerStatus::WaitingCycle,
                running: false,
                cancel: CancellationToken::new(),
            }),
            targets: RwLock::new(Arc::new(Vec::new())),
            init: RwLock::new(Arc::new(OnceCell::new())),
        }
    }

    pub fn village(&self) -> &Village {
        &self.village
    }

    pub fn id(&self) -> VillageId {
        self.village.id
    }

    pub fn status(&self) -> FarmerStatus {
        self.state.lock().status
    }

    pub fn cursor(&self) -> usize {
        self.state.lock().cursor
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    pub fn is_initialized(&self) -> bool {
        self.init.read().initialized()
    }

    /// Current target list. The returned list never changes.
    pub fn targets(&self) -> Arc<Vec<Target>> {
        Arc::clone(&self.targets.read())
    }

    pub fn snapshot(&self) -> FarmerSnapshot {
        let state = self.state.lock();
        FarmerSnapshot {
            village: self.village.id,
            name: self.village.name.clone(),
            status: state.status,
            cursor: state.cursor,
            targets: self.targets.read().len(),
            running: state.running,
            initialized: self.is_initialized(),
        }
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Loads village state and the target list, once.
    ///
    /// Concurrent callers share the same in-flight load. A failed load leaves
    /// the Farmer uninitialized so the next call retries.
    pub async fn init(&self, ctx: &FarmContext) -> Result<(), GatewayError> {
        let cell = Arc::clone(&self.init.read());
        cell.get_or_try_init(|| self.load(ctx)).await?;
        Ok(())
    }

    /// Marks the target list stale; the next [`init`](Self::init) reloads it.
    pub fn invalidate(&self) {
        *self.init.write() = Arc::new(OnceCell::new());
    }

    async fn load(&self, ctx: &FarmContext) -> Result<(), GatewayError> {
        let state = ctx
            .collaborators
            .villages
            .village_state(self.village.id)
            .await?;
        ctx.ledger.seed_village(self.village.id, &state, Instant::now());

        let loaded = ctx.collaborators.targets.load_targets(&self.village).await?;
        let settings = ctx.settings.snapshot();
        let exceptions = ctx.exceptions.snapshot();
        let rules = FilterRules {
            min_distance: settings.min_distance,
            max_distance: settings.max_distance,
            owner: Some(self.village.owner),
            included: Some(&exceptions.included),
            ignored: Some(&exceptions.ignored),
        };
        let metric = |a: Coord, b: Coord| ctx.collaborators.targets.distance(a, b);
        let prepared = prepare_targets(
            loaded,
            self.village.coord,
            metric,
            &rules,
            settings.targets_per_village,
        );

        debug!(
            village = %self.village.id,
            targets = prepared.len(),
            "Farmer target list loaded"
        );

        let len = prepared.len();
        *self.targets.write() = Arc::new(prepared);
        let mut state = self.state.lock();
        if state.cursor > len {
            state.cursor = len;
        }
        Ok(())
    }

    // =========================================================================
    // Start / stop
    // =========================================================================

    /// Runs one turn of this Farmer and returns its stop reason.
    ///
    /// Returns `None` without doing anything if the Farmer is already
    /// running. Fails fast with `command_error` if the Farmer was never
    /// initialized and with `no_targets` if its list is empty.
    pub async fn run(&self, ctx: &FarmContext, loadouts: &[Loadout]) -> Option<FarmerStatus> {
        let token = {
            let mut state = self.state.lock();
            if state.running {
                return None;
            }
            let fail_fast = if !self.is_initialized() {
                Some(FarmerStatus::CommandError)
            } else if self.targets.read().is_empty() {
                Some(FarmerStatus::NoTargets)
            } else {
                None
            };
            if let Some(status) = fail_fast {
                state.status = status;
                drop(state);
                ctx.sink.emit(FarmEvent::FarmerStop {
                    village: self.village.id,
                    reason: status,
                });
                return Some(status);
            }
            state.running = true;
            state.cancel = CancellationToken::new();
            state.cancel.clone()
        };

        ctx.progress.touch();
        ctx.sink.emit(FarmEvent::FarmerStart {
            village: self.village.id,
        });

        let reason = self.drive(ctx, loadouts, &token).await;

        ctx.sink.emit(FarmEvent::FarmerStop {
            village: self.village.id,
            reason,
        });
        Some(reason)
    }

    /// Stops the Farmer with `reason`, cancelling its pending timers.
    ///
    /// A step already in flight is not interrupted; its result is discarded.
    /// Safe to call at any time.
    pub fn stop(&self, reason: FarmerStatus) {
        let mut state = self.state.lock();
        state.cancel.cancel();
        if state.running {
            state.running = false;
            state.status = reason;
        }
    }

    /// Ends the turn unless [`stop`](Self::stop) already did, returning the
    /// reason that stands.
    fn finish(&self, status: FarmerStatus) -> FarmerStatus {
        let mut state = self.state.lock();
        if !state.running {
            return state.status;
        }
        state.running = false;
        state.status = status;
        if status == FarmerStatus::TargetCycleEnd {
            state.cursor = 0;
        }
        status
    }

    // =========================================================================
    // Driver
    // =========================================================================

    async fn drive(
        &self,
        ctx: &FarmContext,
        loadouts: &[Loadout],
        token: &CancellationToken,
    ) -> FarmerStatus {
        let mut phase = Phase::Check;

        loop {
            if !self.is_running() {
                return self.finish(FarmerStatus::UserStop);
            }

            phase = match phase {
                Phase::Pace => {
                    let delay = pacing_delay(ctx.settings.snapshot().pacing_interval());
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => return self.finish(FarmerStatus::UserStop),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    ctx.progress.touch();
                    Phase::Check
                }

                Phase::Check => {
                    let settings = ctx.settings.snapshot();
                    let checked = tokio::select! {
                        biased;
                        _ = token.cancelled() => return self.finish(FarmerStatus::UserStop),
                        result = tokio::time::timeout(
                            settings.step_timeout(),
                            self.check(ctx, &settings, loadouts),
                        ) => result.unwrap_or(Checked::Expired),
                    };
                    ctx.progress.touch();

                    match checked {
                        Checked::Ready(plan) => Phase::Dispatch(plan),
                        Checked::Reject { status, drop } => {
                            self.reject(ctx, status, drop);
                            Phase::Check
                        }
                        Checked::Expired => {
                            self.report(ctx, FarmerStatus::ExpiredStep, None);
                            Phase::Pace
                        }
                        Checked::Stop(status) => {
                            let target = self.current_target().map(|t| t.id);
                            let reason = self.finish(status);
                            self.report(ctx, reason, target);
                            return reason;
                        }
                    }
                }

                Phase::Dispatch(plan) => match self.dispatch(ctx, plan).await {
                    Some(phase) => phase,
                    None => {
                        let reason = self.finish(FarmerStatus::CommandError);
                        self.report(ctx, reason, None);
                        return reason;
                    }
                },
            };
        }
    }

    /// Steps 2 to 10: everything that must pass before a dispatch.
    async fn check(
        &self,
        ctx: &FarmContext,
        settings: &FarmSettings,
        loadouts: &[Loadout],
    ) -> Checked {
        let id = self.village.id;
        let gateway = &ctx.collaborators;

        // Outstanding-action limit.
        let village_state = match gateway.villages.village_state(id).await {
            Ok(state) => state,
            Err(e) => return self.on_gateway_error(e),
        };
        ctx.ledger.seed_village(id, &village_state, Instant::now());
        if village_state.outstanding_actions >= settings.effective_command_limit() {
            return Checked::Stop(FarmerStatus::CommandLimit);
        }

        // Storage.
        if settings.check_full_storage
            && village_state
                .resources
                .is_full(village_state.storage_capacity)
        {
            return Checked::Stop(FarmerStatus::FullStorage);
        }

        // Target selection.
        let Some(target) = self.current_target() else {
            return if self.targets.read().is_empty() {
                Checked::Stop(FarmerStatus::NoTargets)
            } else {
                Checked::Stop(FarmerStatus::TargetCycleEnd)
            };
        };

        // Target validity.
        let fresh = match gateway.targets.target_state(target.id).await {
            Ok(Some(fresh)) => fresh,
            Ok(None) => {
                return Checked::Reject {
                    status: FarmerStatus::AbandonedConquered,
                    drop: true,
                }
            }
            Err(e) => return self.on_gateway_error(e),
        };
        if fresh.points < settings.min_points || fresh.points > settings.max_points {
            return Checked::Reject {
                status: FarmerStatus::NotAllowedPoints,
                drop: true,
            };
        }
        if target.is_unclaimed()
            && fresh.owner.is_some()
            && !ctx.exceptions.snapshot().included.contains(&target.id)
        {
            return Checked::Reject {
                status: FarmerStatus::AbandonedConquered,
                drop: false,
            };
        }
        if fresh.protected {
            return Checked::Reject {
                status: FarmerStatus::ProtectedVillage,
                drop: false,
            };
        }

        // Capability.
        if !self.is_running() {
            return Checked::Stop(FarmerStatus::UserStop);
        }
        if let Err(e) = gateway.actions.ensure_capability_enabled(id).await {
            if !self.is_running() {
                return Checked::Stop(FarmerStatus::UserStop);
            }
            return self.on_gateway_error(e);
        }

        // Sufficiency.
        let mut candidates = Vec::with_capacity(loadouts.len());
        for candidate in loadouts {
            match gateway
                .actions
                .check_candidate_sufficiency(id, &target, candidate)
                .await
            {
                Ok(sufficiency) => candidates.push((candidate.clone(), sufficiency)),
                Err(e) => return self.on_gateway_error(e),
            }
        }
        let max_transit = Duration::from_secs(settings.max_travel_time_secs);
        let (loadout, travel_time) = match loadout::select(candidates, max_transit) {
            Selection::Selected {
                loadout,
                travel_time,
            } => (loadout, travel_time),
            Selection::TimeLimit => {
                return Checked::Reject {
                    status: FarmerStatus::TimeLimit,
                    drop: false,
                }
            }
            Selection::NoUnits => return Checked::Stop(FarmerStatus::NoUnits),
        };

        // Local concurrency.
        let policy = BusyPolicy::from_settings(settings);
        let now = Instant::now();
        let arrival = instant_after(now, travel_time);
        let outstanding = ctx.ledger.outstanding(target.id, now);
        let verdict = policy.local_verdict(id, &outstanding, ctx.ledger.all_known());
        if verdict == BusyVerdict::Busy {
            return busy();
        }

        // Minimum re-attack interval.
        if policy.too_soon(id, &ctx.ledger.recent(target.id, now), arrival) {
            return busy();
        }

        // Authoritative remote check.
        if verdict == BusyVerdict::Undecided {
            let incoming = match gateway.actions.incoming_actions(id, target.id).await {
                Ok(incoming) => incoming,
                Err(e) => return self.on_gateway_error(e),
            };
            if !self.is_running() {
                return Checked::Stop(FarmerStatus::UserStop);
            }
            let now = Instant::now();
            let known: Vec<KnownAction> = incoming
                .iter()
                .map(|a| KnownAction {
                    source: a.source,
                    arrival: instant_after(now, a.arrival_in),
                })
                .collect();
            if policy.remote_verdict(id, &known, arrival) == BusyVerdict::Busy {
                return busy();
            }
        }

        Checked::Ready(Plan {
            target,
            loadout,
            travel_time,
        })
    }

    /// Step 11. Returns the next phase, or `None` if the dispatch failed.
    async fn dispatch(&self, ctx: &FarmContext, plan: Plan) -> Option<Phase> {
        let id = self.village.id;
        let target = plan.target.id;

        if !ctx
            .ledger
            .mark_in_flight(id, target, plan.travel_time, Instant::now())
        {
            self.reject(ctx, FarmerStatus::BusyTarget, false);
            return Some(Phase::Check);
        }

        // Last chance to honour a stop before anything leaves the village.
        {
            let mut state = self.state.lock();
            if !state.running {
                drop(state);
                ctx.ledger.abandon(id, target);
                return Some(Phase::Check);
            }
            state.status = FarmerStatus::Attacking;
            state.cursor += 1;
        }
        self.report(ctx, FarmerStatus::Attacking, Some(target));

        let step_timeout = ctx.settings.snapshot().step_timeout();
        let result = tokio::time::timeout(
            step_timeout,
            ctx.collaborators
                .actions
                .dispatch_action(id, &plan.target, &plan.loadout),
        )
        .await;
        ctx.progress.touch();

        match result {
            Ok(Ok(action)) => {
                ctx.ledger.confirm(id, target, action.clone());
                if !self.is_running() {
                    return Some(Phase::Check);
                }
                ctx.exceptions
                    .record_outcome(target, format!("sent {}", plan.loadout.name));
                ctx.sink.emit(FarmEvent::ActionDispatched {
                    village: id,
                    target,
                    action,
                });
                Some(Phase::Pace)
            }
            Ok(Err(e)) => {
                ctx.ledger.abandon(id, target);
                if !self.is_running() {
                    return Some(Phase::Check);
                }
                warn!(village = %id, target = %target, error = %e, "Dispatch failed");
                ctx.exceptions.record_outcome(target, e.to_string());
                None
            }
            Err(_) => {
                ctx.ledger.abandon(id, target);
                self.report(ctx, FarmerStatus::ExpiredStep, Some(target));
                Some(Phase::Pace)
            }
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn current_target(&self) -> Option<Target> {
        let cursor = self.state.lock().cursor;
        self.targets.read().get(cursor).cloned()
    }

    /// Skips the current target, dropping it from the list if asked.
    fn reject(&self, ctx: &FarmContext, status: FarmerStatus, drop_target: bool) {
        let target = self.current_target().map(|t| t.id);
        {
            let mut state = self.state.lock();
            if !state.running {
                return;
            }
            state.status = status;
            if drop_target {
                let cursor = state.cursor;
                let mut targets = self.targets.write();
                if cursor < targets.len() {
                    let mut next = targets.as_ref().clone();
                    next.remove(cursor);
                    *targets = Arc::new(next);
                }
            } else {
                state.cursor += 1;
            }
        }
        if let Some(target) = target {
            ctx.exceptions.record_outcome(target, status.as_str());
        }
        self.report(ctx, status, target);
    }

    fn report(&self, ctx: &FarmContext, status: FarmerStatus, target: Option<TargetId>) {
        if status != FarmerStatus::Attacking {
            self.state.lock().status = status;
        }
        debug!(village = %self.village.id, status = %status, "Farmer step");
        ctx.sink.emit(FarmEvent::StepStatus {
            village: self.village.id,
            target,
            status,
        });
    }

    fn on_gateway_error(&self, error: GatewayError) -> Checked {
        match error {
            GatewayError::Timeout => Checked::Expired,
            GatewayError::Stopped => Checked::Stop(FarmerStatus::UserStop),
            other => {
                warn!(village = %self.village.id, error = %other, "Collaborator call failed");
                Checked::Stop(FarmerStatus::CommandError)
            }
        }
    }
}

fn busy() -> Checked {
    Checked::Reject {
        status: FarmerStatus::BusyTarget,
        drop: false,
    }
}

/// Randomized pacing delay: `base` ± 50%.
fn pacing_delay(base: Duration) -> Duration {
    let base_ms = base.as_millis() as u64;
    if base_ms == 0 {
        return Duration::ZERO;
    }
    let jitter = rand::thread_rng().gen_range(base_ms / 2..=base_ms + base_ms / 2);
    Duration::from_millis(jitter)
}

impl std::fmt::Debug for Farmer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Farmer")
            .field("village", &self.village.id)
            .field("status", &state.status)
            .field("cursor", &state.cursor)
            .field("running", &state.running)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pacing_delay_within_half_of_base() {
        let base = Duration::from_millis(1000);
        for _ in 0..200 {
            let delay = pacing_delay(base);
            assert!(delay >= Duration::from_millis(500));
            assert!(delay <= Duration::from_millis(1500));
        }
        assert_eq!(pacing_delay(Duration::ZERO), Duration::ZERO);
    }
}
