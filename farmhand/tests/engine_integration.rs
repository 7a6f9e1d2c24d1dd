//! Integration tests for the cycle scheduler and the farming engine.
//!
//! These tests verify:
//! - Cycle rotation: index bounds, one cycle end per pass
//! - Reloads applied at cycle boundaries (exceptions, settings)
//! - Engine lifecycle: start, stop, halt, watchdog restart
//!
//! Run with: `cargo test --test engine_integration`

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use farmhand::config::{FarmSettings, SettingKey, SettingsHandle};
use farmhand::engine::{EngineError, FarmEngine};
use farmhand::events::{EventLog, EventSink, FarmEvent, LogKind, MultiplexEventSink};
use farmhand::exceptions::{ExceptionRegistry, ExceptionSet, ExceptionSets};
use farmhand::farmer::{ActionLedger, FarmContext};
use farmhand::gateway::{Collaborators, Loadout, Village};
use farmhand::scheduler::CycleScheduler;
use farmhand::sim::{SimCall, SimulatedWorld};
use farmhand::target::{Coord, GroupId, PlayerId, Target, TargetId, VillageId};
use farmhand::watchdog::ProgressTracker;

// ============================================================================
// Test Helpers
// ============================================================================

const V1: VillageId = VillageId(1);
const V2: VillageId = VillageId(2);

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<FarmEvent>>,
}

impl RecordingSink {
    fn events(&self) -> Vec<FarmEvent> {
        self.events.lock().clone()
    }

    fn count(&self, pred: impl Fn(&FarmEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: FarmEvent) {
        self.events.lock().push(event);
    }
}

fn village(id: VillageId, x: i32, y: i32) -> Village {
    Village {
        id,
        name: format!("Village {}", id.get()),
        coord: Coord::new(x, y),
        owner: PlayerId(1),
        groups: Vec::new(),
    }
}

fn quick_settings() -> FarmSettings {
    FarmSettings {
        pacing_interval_ms: 0,
        cycle_pause_secs: 10,
        min_attack_interval_secs: 0,
        ..Default::default()
    }
}

/// Two villages with one nearby target each.
fn two_village_world() -> Arc<SimulatedWorld> {
    let world = SimulatedWorld::new().with_secs_per_field(60.0);
    world.add_village(village(V1, 0, 0), [("spear", 100)]);
    world.add_village(village(V2, 20, 0), [("spear", 100)]);
    world.add_target(Target::unclaimed(TargetId(10), Coord::new(0, 2), 100));
    world.add_target(Target::unclaimed(TargetId(20), Coord::new(20, 2), 100));
    world.set_loadouts(vec![Loadout::new("spears", 500).with_units("spear", 20)]);
    Arc::new(world)
}

fn context(world: &Arc<SimulatedWorld>, settings: FarmSettings) -> (FarmContext, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let ctx = FarmContext {
        collaborators: Collaborators::from_world(Arc::clone(world)),
        settings: SettingsHandle::new(settings),
        exceptions: Arc::new(ExceptionRegistry::new()),
        ledger: Arc::new(ActionLedger::new()),
        progress: ProgressTracker::new(),
        sink: sink.clone(),
    };
    (ctx, sink)
}

fn engine(world: &Arc<SimulatedWorld>, settings: FarmSettings) -> (FarmEngine, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let engine = FarmEngine::new(
        Collaborators::from_world(Arc::clone(world)),
        SettingsHandle::new(settings),
        Arc::new(ExceptionRegistry::new()),
        sink.clone(),
    )
    .with_restart_delay(Duration::from_secs(2))
    .with_watchdog_interval(Duration::from_secs(1));
    (engine, sink)
}

fn is_cycle_end(e: &FarmEvent) -> bool {
    matches!(e, FarmEvent::CycleEnd { .. })
}

// ============================================================================
// Cycle scheduler
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_scheduler_rotates_through_farmers() {
    let world = two_village_world();
    let (ctx, sink) = context(&world, quick_settings());
    let mut scheduler = CycleScheduler::new(ctx);
    scheduler.prime(vec![village(V1, 0, 0), village(V2, 20, 0)]);
    let view = scheduler.view();
    let never = CancellationToken::new();

    // Opens the first pass.
    assert!(scheduler.advance(&never).await.is_none());
    assert_eq!(sink.count(|e| matches!(e, FarmEvent::CycleBegin { farmers: 2 })), 1);
    assert_eq!(view.index(), 0);

    assert!(scheduler.advance(&never).await.is_none());
    assert_eq!(view.index(), 1);
    assert!(scheduler.advance(&never).await.is_none());
    assert_eq!(view.index(), 2);
    assert_eq!(view.index(), view.len());

    // Closes the pass, waits the pause, opens the next one.
    assert!(scheduler.advance(&never).await.is_none());
    assert_eq!(view.index(), 0);
    assert_eq!(view.completed_cycles(), 1);
    assert_eq!(view.next_cycle_at(), None);
    assert_eq!(sink.count(is_cycle_end), 1);
    assert_eq!(sink.count(|e| matches!(e, FarmEvent::CycleBegin { .. })), 2);

    let senders: Vec<VillageId> = world.dispatches().iter().map(|d| d.village).collect();
    assert_eq!(senders, vec![V1, V2]);
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_index_stays_in_bounds_over_many_cycles() {
    let world = two_village_world();
    let (ctx, sink) = context(&world, quick_settings());
    let mut scheduler = CycleScheduler::new(ctx);
    scheduler.prime(vec![village(V1, 0, 0), village(V2, 20, 0)]);
    let view = scheduler.view();
    let never = CancellationToken::new();

    for _ in 0..20 {
        assert!(scheduler.advance(&never).await.is_none());
        assert!(view.index() <= view.len());
    }

    // One opening call, then three calls per pass of two Farmers.
    assert_eq!(view.completed_cycles(), 6);
    assert_eq!(sink.count(is_cycle_end), 6);
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_with_no_farmers_backs_off() {
    let world = Arc::new(SimulatedWorld::new());
    world.set_loadouts(vec![Loadout::new("spears", 500).with_units("spear", 20)]);
    let settings = FarmSettings {
        cycle_pause_secs: 0,
        ..quick_settings()
    };
    let (ctx, sink) = context(&world, settings);
    let mut scheduler = CycleScheduler::new(ctx);
    scheduler.prime(Vec::new());
    let never = CancellationToken::new();

    let started = tokio::time::Instant::now();
    scheduler.advance(&never).await;
    scheduler.advance(&never).await;

    assert!(started.elapsed() >= Duration::from_secs(1));
    assert_eq!(sink.count(is_cycle_end), 1);
}

#[tokio::test(start_paused = true)]
async fn test_interrupt_stops_the_active_farmer() {
    let world = Arc::new(
        SimulatedWorld::new()
            .with_secs_per_field(60.0)
            .with_latency(Duration::from_secs(1)),
    );
    world.add_village(village(V1, 0, 0), [("spear", 100)]);
    world.add_target(Target::unclaimed(TargetId(10), Coord::new(0, 2), 100));
    world.set_loadouts(vec![Loadout::new("spears", 500).with_units("spear", 20)]);
    let (ctx, _sink) = context(&world, quick_settings());
    let mut scheduler = CycleScheduler::new(ctx);
    scheduler.prime(vec![village(V1, 0, 0)]);
    let view = scheduler.view();

    let interrupt = CancellationToken::new();
    let cancel = interrupt.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(4500)).await;
        cancel.cancel();
    });

    let exit = scheduler.run(&interrupt).await;

    assert_eq!(exit, farmhand::scheduler::SchedulerExit::Interrupted);
    // The interrupted Farmer keeps its slot.
    assert_eq!(view.index(), 0);
    assert!(!view.farmers()[0].is_running());
}

#[tokio::test(start_paused = true)]
async fn test_exception_change_invalidates_at_next_boundary() {
    let world = two_village_world();
    let (ctx, sink) = context(&world, quick_settings());
    let exceptions = Arc::clone(&ctx.exceptions);
    let mut scheduler = CycleScheduler::new(ctx);
    scheduler.prime(vec![village(V1, 0, 0), village(V2, 20, 0)]);
    let view = scheduler.view();
    let never = CancellationToken::new();

    scheduler.advance(&never).await; // open
    scheduler.advance(&never).await; // V1
    let v1 = Arc::clone(&view.farmers()[0]);
    assert_eq!(v1.targets().len(), 1);

    exceptions.ignore(TargetId(10), Some("manual".into()));
    assert!(exceptions.audit_entry(TargetId(10)).is_some());

    scheduler.advance(&never).await; // V2
    assert!(v1.is_initialized(), "reloads wait for the boundary");

    scheduler.advance(&never).await; // close + open
    assert!(!v1.is_initialized());
    assert!(view.farmers()[1].is_initialized());
    assert_eq!(
        sink.count(|e| matches!(
            e,
            FarmEvent::ExceptionChanged(change)
                if change.target == TargetId(10) && change.set == ExceptionSet::Ignored
        )),
        1
    );

    scheduler.advance(&never).await; // V1 reloads
    assert!(v1.targets().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_group_source_change_reloads_exceptions_at_boundary() {
    let world = two_village_world();
    let (ctx, _sink) = context(&world, quick_settings());
    let exceptions = Arc::clone(&ctx.exceptions);
    let mut scheduler = CycleScheduler::new(ctx);
    scheduler.prime(vec![village(V1, 0, 0), village(V2, 20, 0)]);
    let never = CancellationToken::new();
    scheduler.advance(&never).await;

    let mut sets = ExceptionSets::default();
    sets.ignored.insert(TargetId(20));
    world.set_exception_sets(sets);
    assert!(!exceptions.contains(TargetId(20), ExceptionSet::Ignored));

    for _ in 0..3 {
        scheduler.advance(&never).await;
    }

    assert!(exceptions.contains(TargetId(20), ExceptionSet::Ignored));
    assert!(exceptions.audit_entry(TargetId(20)).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_settings_change_rebuilds_farmers_at_boundary() {
    let world = Arc::new(SimulatedWorld::new().with_secs_per_field(60.0));
    let mut grouped = village(V2, 20, 0);
    grouped.groups.push(GroupId(9));
    world.add_village(village(V1, 0, 0), [("spear", 100)]);
    world.add_village(grouped.clone(), [("spear", 100)]);
    world.set_loadouts(vec![Loadout::new("spears", 500).with_units("spear", 20)]);
    let (ctx, _sink) = context(&world, quick_settings());
    let settings = ctx.settings.clone();
    let mut scheduler = CycleScheduler::new(ctx);
    scheduler.prime(vec![village(V1, 0, 0), grouped]);
    let view = scheduler.view();
    let never = CancellationToken::new();

    scheduler.advance(&never).await; // open
    scheduler.advance(&never).await; // V1
    settings.set(SettingKey::ExcludeVillageGroup, "9").unwrap();
    assert_eq!(view.len(), 2);

    scheduler.advance(&never).await; // V2
    assert_eq!(view.len(), 2);
    scheduler.advance(&never).await; // close + open

    let ids: Vec<VillageId> = view.farmers().iter().map(|f| f.id()).collect();
    assert_eq!(ids, vec![V1]);
    assert_eq!(view.index(), 0);
}

// ============================================================================
// Engine lifecycle
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_engine_start_and_stop() {
    let world = two_village_world();
    let (engine, sink) = engine(&world, quick_settings());

    engine.start().await.unwrap();
    assert!(engine.is_running());
    assert!(matches!(engine.start().await, Err(EngineError::AlreadyRunning)));

    tokio::time::sleep(Duration::from_secs(30)).await;
    let snapshot = engine.snapshot();
    assert!(snapshot.running);
    assert_eq!(snapshot.farmers.len(), 2);
    assert!(snapshot.completed_cycles >= 1);
    assert!(snapshot.index <= snapshot.farmers.len());

    engine.stop().await.unwrap();

    assert!(!engine.is_running());
    assert!(!engine.snapshot().running);
    assert!(sink
        .events()
        .contains(&FarmEvent::EngineStarted { farmers: 2 }));
    assert_eq!(sink.count(|e| *e == FarmEvent::EngineStopped), 1);
    assert!(!world.dispatches().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_engine_halts_without_loadouts() {
    let world = two_village_world();
    world.set_loadouts(Vec::new());
    let (engine, sink) = engine(&world, quick_settings());

    engine.start().await.unwrap();
    engine.wait().await;

    assert!(!engine.is_running());
    assert_eq!(engine.stop().await, Err(EngineError::NoLoadouts));
    assert_eq!(
        sink.count(|e| matches!(e, FarmEvent::EngineHalted { .. })),
        1
    );
    assert_eq!(sink.count(|e| *e == FarmEvent::EngineStopped), 0);
    assert!(world.dispatches().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_engine_restarts_after_stuck_call() {
    let world = two_village_world();
    // Target loading is not bounded by the step timeout.
    world.hang_next(SimCall::LoadTargets);
    let (engine, sink) = engine(&world, quick_settings());

    engine.start().await.unwrap();
    for _ in 0..120 {
        if engine.snapshot().restarts > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    assert_eq!(engine.snapshot().restarts, 1);
    assert_eq!(
        sink.count(|e| matches!(e, FarmEvent::EngineRestarted { restarts: 1, .. })),
        1
    );

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(engine.is_running());
    assert_eq!(engine.snapshot().restarts, 1);
    assert!(!world.dispatches().is_empty());

    engine.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_reload_survives_restart_during_village_reload() {
    let world = Arc::new(SimulatedWorld::new().with_secs_per_field(60.0));
    let mut grouped = village(V2, 20, 0);
    grouped.groups.push(GroupId(9));
    world.add_village(village(V1, 0, 0), [("spear", 100)]);
    world.add_village(grouped, [("spear", 100)]);
    world.add_target(Target::unclaimed(TargetId(10), Coord::new(0, 2), 100));
    world.add_target(Target::unclaimed(TargetId(20), Coord::new(20, 2), 100));
    world.set_loadouts(vec![Loadout::new("spears", 500).with_units("spear", 20)]);
    let (engine, _sink) = engine(&world, quick_settings());

    engine.start().await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    // The boundary reload that applies the exclusion gets stuck.
    world.hang_next(SimCall::OwnedVillages);
    engine
        .settings()
        .set(SettingKey::ExcludeVillageGroup, "9")
        .unwrap();

    for _ in 0..120 {
        tokio::time::sleep(Duration::from_secs(1)).await;
        if engine.snapshot().restarts > 0 && engine.snapshot().farmers.len() == 1 {
            break;
        }
    }

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.restarts, 1);
    let ids: Vec<VillageId> = snapshot.farmers.iter().map(|f| f.village).collect();
    assert_eq!(ids, vec![V1]);
    assert!(world.calls(SimCall::OwnedVillages) >= 3);

    engine.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_engine_start_fails_when_villages_unavailable() {
    let world = two_village_world();
    world.fail_next(
        SimCall::OwnedVillages,
        farmhand::gateway::GatewayError::Unavailable("offline".into()),
    );
    let (engine, _sink) = engine(&world, quick_settings());

    assert!(matches!(engine.start().await, Err(EngineError::Gateway(_))));
    assert!(!engine.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_event_log_collects_engine_events() {
    let world = two_village_world();
    let log = Arc::new(EventLog::new(100));
    let mut sink = MultiplexEventSink::new(Vec::new());
    sink.add_sink(log.clone());
    let engine = FarmEngine::new(
        Collaborators::from_world(Arc::clone(&world)),
        SettingsHandle::new(quick_settings()),
        Arc::new(ExceptionRegistry::new()),
        Arc::new(sink),
    );

    engine.start().await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    engine.stop().await.unwrap();

    let kinds: Vec<LogKind> = log.entries().iter().map(|e| e.kind).collect();
    assert_eq!(kinds.first(), Some(&LogKind::EngineStarted));
    assert_eq!(kinds.last(), Some(&LogKind::EngineStopped));
    assert!(kinds.contains(&LogKind::ActionDispatched));
    assert!(log.len() <= 100);
}
