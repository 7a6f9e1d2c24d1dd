//! In-memory world implementing every collaborator trait.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::exceptions::ExceptionSets;
use crate::gateway::{
    ActionGateway, BoxFuture, ExceptionGroupSource, GatewayError, IncomingAction, Loadout,
    OutgoingAction, Resources, Sufficiency, TargetSource, Village, VillageSource, VillageState,
};
use crate::target::{
    euclidean, ActionId, PlayerId, Target, TargetId, TargetState, VillageId,
};

/// Default travel speed in seconds per field.
pub const DEFAULT_SECS_PER_FIELD: f64 = 600.0;

/// Collaborator call kinds, for scripting failures and counting calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimCall {
    LoadTargets,
    TargetState,
    OwnedVillages,
    VillageState,
    EnableCapability,
    Loadouts,
    Sufficiency,
    IncomingActions,
    Dispatch,
    ExceptionGroups,
}

/// Scripted misbehaviour of one call kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimFailure {
    /// The next call fails with this error.
    Error(GatewayError),
    /// The next call never resolves.
    Hang,
}

/// An action the world accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRecord {
    pub action: ActionId,
    pub village: VillageId,
    pub target: TargetId,
    pub loadout: String,
    pub sent_at: Instant,
    pub arrival: Instant,
}

#[derive(Debug, Clone)]
struct SimVillage {
    village: Village,
    units: BTreeMap<String, u32>,
    resources: Resources,
    storage_capacity: u64,
    /// Outstanding actions not modelled as dispatches (e.g. support, trades).
    extra_outstanding: u32,
    reports_actions: bool,
}

#[derive(Debug, Clone)]
struct SimTarget {
    target: Target,
    protected: bool,
}

#[derive(Debug, Clone)]
struct SimAction {
    record: DispatchRecord,
    units: BTreeMap<String, u32>,
    returns: Instant,
}

#[derive(Debug, Default)]
struct WorldState {
    villages: BTreeMap<VillageId, SimVillage>,
    targets: BTreeMap<TargetId, SimTarget>,
    loadouts: Vec<Loadout>,
    exception_sets: ExceptionSets,
    active: Vec<SimAction>,
    dispatched: Vec<DispatchRecord>,
    enabled: HashSet<VillageId>,
    failures: HashMap<SimCall, VecDeque<SimFailure>>,
    hanging: HashSet<SimCall>,
    calls: HashMap<SimCall, u64>,
    next_action: u64,
}

impl WorldState {
    /// Brings returned actions home.
    fn settle(&mut self, now: Instant) {
        let (home, away): (Vec<_>, Vec<_>) =
            self.active.drain(..).partition(|a| a.returns <= now);
        self.active = away;
        for action in home {
            if let Some(village) = self.villages.get_mut(&action.record.village) {
                for (unit, count) in action.units {
                    *village.units.entry(unit).or_default() += count;
                }
            }
        }
    }
}

/// Deterministic in-memory game world.
pub struct SimulatedWorld {
    state: Mutex<WorldState>,
    latency: Duration,
    secs_per_field: f64,
    unit_speeds: HashMap<String, f64>,
    groups: watch::Sender<u64>,
}

impl SimulatedWorld {
    pub fn new() -> Self {
        let (groups, _) = watch::channel(0);
        Self {
            state: Mutex::new(WorldState::default()),
            latency: Duration::ZERO,
            secs_per_field: DEFAULT_SECS_PER_FIELD,
            unit_speeds: HashMap::new(),
            groups,
        }
    }

    /// Delay added to every collaborator call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Default travel speed for units without their own speed.
    pub fn with_secs_per_field(mut self, secs_per_field: f64) -> Self {
        self.secs_per_field = secs_per_field;
        self
    }

    /// Travel speed of one unit type; a loadout moves at its slowest unit.
    pub fn with_unit_speed(mut self, unit: impl Into<String>, secs_per_field: f64) -> Self {
        self.unit_speeds.insert(unit.into(), secs_per_field);
        self
    }

    // =========================================================================
    // World setup
    // =========================================================================

    /// Adds an owned village with its units at home.
    pub fn add_village<I, S>(&self, village: Village, units: I)
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let units = units.into_iter().map(|(u, c)| (u.into(), c)).collect();
        self.state.lock().villages.insert(
            village.id,
            SimVillage {
                village,
                units,
                resources: Resources::default(),
                storage_capacity: 400_000,
                extra_outstanding: 0,
                reports_actions: true,
            },
        );
    }

    pub fn add_target(&self, target: Target) {
        self.state.lock().targets.insert(
            target.id,
            SimTarget {
                target,
                protected: false,
            },
        );
    }

    pub fn remove_target(&self, target: TargetId) {
        self.state.lock().targets.remove(&target);
    }

    pub fn set_protected(&self, target: TargetId, protected: bool) {
        if let Some(t) = self.state.lock().targets.get_mut(&target) {
            t.protected = protected;
        }
    }

    pub fn set_target_owner(&self, target: TargetId, owner: Option<PlayerId>) {
        if let Some(t) = self.state.lock().targets.get_mut(&target) {
            t.target.owner = owner;
        }
    }

    pub fn set_target_points(&self, target: TargetId, points: u32) {
        if let Some(t) = self.state.lock().targets.get_mut(&target) {
            t.target.points = points;
        }
    }

    /// Outstanding actions a village has besides the ones sent here.
    pub fn set_outstanding(&self, village: VillageId, count: u32) {
        if let Some(v) = self.state.lock().villages.get_mut(&village) {
            v.extra_outstanding = count;
        }
    }

    pub fn set_resources(&self, village: VillageId, resources: Resources, capacity: u64) {
        if let Some(v) = self.state.lock().villages.get_mut(&village) {
            v.resources = resources;
            v.storage_capacity = capacity;
        }
    }

    /// Whether the village reports its outgoing actions completely.
    pub fn set_reports_actions(&self, village: VillageId, reports: bool) {
        if let Some(v) = self.state.lock().villages.get_mut(&village) {
            v.reports_actions = reports;
        }
    }

    pub fn set_units(&self, village: VillageId, unit: impl Into<String>, count: u32) {
        if let Some(v) = self.state.lock().villages.get_mut(&village) {
            v.units.insert(unit.into(), count);
        }
    }

    pub fn set_loadouts(&self, loadouts: Vec<Loadout>) {
        self.state.lock().loadouts = loadouts;
    }

    /// Replaces the exception groups and notifies subscribers.
    pub fn set_exception_sets(&self, sets: ExceptionSets) {
        self.state.lock().exception_sets = sets;
        self.groups.send_modify(|rev| *rev += 1);
    }

    /// Records an action sent from outside the engine (another client).
    pub fn inject_action(&self, village: VillageId, target: TargetId, arrival_in: Duration) {
        let now = Instant::now();
        let mut state = self.state.lock();
        state.next_action += 1;
        let record = DispatchRecord {
            action: ActionId::new(format!("ext-{}", state.next_action)),
            village,
            target,
            loadout: String::from("external"),
            sent_at: now,
            arrival: now + arrival_in,
        };
        state.active.push(SimAction {
            record,
            units: BTreeMap::new(),
            returns: now + arrival_in * 2,
        });
    }

    // =========================================================================
    // Failure scripting
    // =========================================================================

    /// Queues a failure for the next call of `call`.
    pub fn fail_next(&self, call: SimCall, error: GatewayError) {
        self.state
            .lock()
            .failures
            .entry(call)
            .or_default()
            .push_back(SimFailure::Error(error));
    }

    /// Makes the next call of `call` hang forever, like a stuck request.
    pub fn hang_next(&self, call: SimCall) {
        self.state
            .lock()
            .failures
            .entry(call)
            .or_default()
            .push_back(SimFailure::Hang);
    }

    /// Makes every call of `call` hang until [`clear_failures`](Self::clear_failures).
    pub fn hang(&self, call: SimCall) {
        self.state.lock().hanging.insert(call);
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock();
        state.failures.clear();
        state.hanging.clear();
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Every action accepted so far, in dispatch order.
    pub fn dispatches(&self) -> Vec<DispatchRecord> {
        self.state.lock().dispatched.clone()
    }

    pub fn calls(&self, call: SimCall) -> u64 {
        self.state.lock().calls.get(&call).copied().unwrap_or(0)
    }

    pub fn capability_enabled(&self, village: VillageId) -> bool {
        self.state.lock().enabled.contains(&village)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Common prologue of every call: count, delay, scripted failure.
    async fn enter(&self, call: SimCall) -> Result<(), GatewayError> {
        let (failure, hanging) = {
            let mut state = self.state.lock();
            *state.calls.entry(call).or_default() += 1;
            let failure = state.failures.get_mut(&call).and_then(VecDeque::pop_front);
            (failure, state.hanging.contains(&call))
        };

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if hanging {
            std::future::pending::<()>().await;
        }
        match failure {
            Some(SimFailure::Error(error)) => Err(error),
            Some(SimFailure::Hang) => {
                std::future::pending::<()>().await;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn travel_time(&self, village: &SimVillage, target: &Target, loadout: &Loadout) -> Duration {
        let distance = euclidean(village.village.coord, target.coord);
        let speed = loadout
            .units
            .keys()
            .map(|unit| {
                self.unit_speeds
                    .get(unit)
                    .copied()
                    .unwrap_or(self.secs_per_field)
            })
            .reduce(f64::max)
            .unwrap_or(self.secs_per_field);
        Duration::from_secs_f64((distance * speed).max(0.0))
    }
}

fn has_units(home: &BTreeMap<String, u32>, loadout: &Loadout) -> bool {
    loadout
        .units
        .iter()
        .all(|(unit, count)| home.get(unit).copied().unwrap_or(0) >= *count)
}

fn unknown_village(village: VillageId) -> GatewayError {
    GatewayError::Rejected(format!("unknown village {village}"))
}

impl Default for SimulatedWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SimulatedWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SimulatedWorld")
            .field("villages", &state.villages.len())
            .field("targets", &state.targets.len())
            .field("dispatched", &state.dispatched.len())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Collaborator implementations
// =============================================================================

impl TargetSource for SimulatedWorld {
    fn load_targets<'a>(
        &'a self,
        _origin: &'a Village,
    ) -> BoxFuture<'a, Result<Vec<Target>, GatewayError>> {
        Box::pin(async move {
            self.enter(SimCall::LoadTargets).await?;
            let state = self.state.lock();
            Ok::<_, GatewayError>(state.targets.values().map(|t| t.target.clone()).collect())
        })
    }

    fn target_state(
        &self,
        target: TargetId,
    ) -> BoxFuture<'_, Result<Option<TargetState>, GatewayError>> {
        Box::pin(async move {
            self.enter(SimCall::TargetState).await?;
            let state = self.state.lock();
            Ok::<_, GatewayError>(state.targets.get(&target).map(|t| TargetState {
                owner: t.target.owner,
                points: t.target.points,
                protected: t.protected,
            }))
        })
    }
}

impl VillageSource for SimulatedWorld {
    fn owned_villages(&self) -> BoxFuture<'_, Result<Vec<Village>, GatewayError>> {
        Box::pin(async move {
            self.enter(SimCall::OwnedVillages).await?;
            let state = self.state.lock();
            Ok::<_, GatewayError>(state.villages.values().map(|v| v.village.clone()).collect())
        })
    }

    fn village_state(
        &self,
        village: VillageId,
    ) -> BoxFuture<'_, Result<VillageState, GatewayError>> {
        Box::pin(async move {
            self.enter(SimCall::VillageState).await?;
            let now = Instant::now();
            let mut state = self.state.lock();
            state.settle(now);

            let own: Vec<&SimAction> = state
                .active
                .iter()
                .filter(|a| a.record.village == village)
                .collect();
            let outgoing = own
                .iter()
                .map(|a| OutgoingAction {
                    target: a.record.target,
                    arrival_in: a.record.arrival.saturating_duration_since(now),
                    return_in: a.returns.saturating_duration_since(now),
                })
                .collect::<Vec<_>>();
            let sent = own.len() as u32;

            let v = state
                .villages
                .get(&village)
                .ok_or_else(|| unknown_village(village))?;
            Ok::<_, GatewayError>(VillageState {
                outstanding_actions: v.extra_outstanding + sent,
                resources: v.resources,
                storage_capacity: v.storage_capacity,
                outgoing: if v.reports_actions { outgoing } else { Vec::new() },
                actions_known: v.reports_actions,
            })
        })
    }
}

impl ActionGateway for SimulatedWorld {
    fn ensure_capability_enabled(
        &self,
        village: VillageId,
    ) -> BoxFuture<'_, Result<(), GatewayError>> {
        Box::pin(async move {
            self.enter(SimCall::EnableCapability).await?;
            self.state.lock().enabled.insert(village);
            Ok::<_, GatewayError>(())
        })
    }

    fn loadouts(&self) -> BoxFuture<'_, Result<Vec<Loadout>, GatewayError>> {
        Box::pin(async move {
            self.enter(SimCall::Loadouts).await?;
            Ok::<_, GatewayError>(self.state.lock().loadouts.clone())
        })
    }

    fn check_candidate_sufficiency<'a>(
        &'a self,
        village: VillageId,
        target: &'a Target,
        loadout: &'a Loadout,
    ) -> BoxFuture<'a, Result<Sufficiency, GatewayError>> {
        Box::pin(async move {
            self.enter(SimCall::Sufficiency).await?;
            let mut state = self.state.lock();
            state.settle(Instant::now());
            let v = state
                .villages
                .get(&village)
                .ok_or_else(|| unknown_village(village))?;
            Ok::<_, GatewayError>(Sufficiency {
                sufficient: has_units(&v.units, loadout),
                travel_time: self.travel_time(v, target, loadout),
            })
        })
    }

    fn incoming_actions(
        &self,
        _village: VillageId,
        target: TargetId,
    ) -> BoxFuture<'_, Result<Vec<IncomingAction>, GatewayError>> {
        Box::pin(async move {
            self.enter(SimCall::IncomingActions).await?;
            let now = Instant::now();
            let state = self.state.lock();
            Ok::<_, GatewayError>(state
                .active
                .iter()
                .filter(|a| a.record.target == target && a.record.arrival > now)
                .map(|a| IncomingAction {
                    source: a.record.village,
                    arrival_in: a.record.arrival - now,
                })
                .collect())
        })
    }

    fn dispatch_action<'a>(
        &'a self,
        village: VillageId,
        target: &'a Target,
        loadout: &'a Loadout,
    ) -> BoxFuture<'a, Result<ActionId, GatewayError>> {
        Box::pin(async move {
            self.enter(SimCall::Dispatch).await?;
            let now = Instant::now();
            let mut state = self.state.lock();
            state.settle(now);

            let travel = {
                let v = state
                    .villages
                    .get(&village)
                    .ok_or_else(|| unknown_village(village))?;
                if !has_units(&v.units, loadout) {
                    return Err(GatewayError::Rejected(format!(
                        "not enough units for {}",
                        loadout.name
                    )));
                }
                self.travel_time(v, target, loadout)
            };

            if let Some(v) = state.villages.get_mut(&village) {
                for (unit, count) in &loadout.units {
                    if let Some(home) = v.units.get_mut(unit) {
                        *home -= count;
                    }
                }
            }

            state.next_action += 1;
            let record = DispatchRecord {
                action: ActionId::new(format!("a{}", state.next_action)),
                village,
                target: target.id,
                loadout: loadout.name.clone(),
                sent_at: now,
                arrival: now + travel,
            };
            state.dispatched.push(record.clone());
            state.active.push(SimAction {
                record: record.clone(),
                units: loadout.units.clone(),
                returns: now + travel * 2,
            });
            Ok::<_, GatewayError>(record.action)
        })
    }
}

impl ExceptionGroupSource for SimulatedWorld {
    fn current(&self) -> BoxFuture<'_, Result<ExceptionSets, GatewayError>> {
        Box::pin(async move {
            self.enter(SimCall::ExceptionGroups).await?;
            Ok::<_, GatewayError>(self.state.lock().exception_sets.clone())
        })
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.groups.subscribe()
    }
}
