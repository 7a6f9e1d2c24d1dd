//! Integration tests for the Farmer step pipeline.
//!
//! Each test drives one or more Farmers against a `SimulatedWorld` on a
//! paused clock and checks the resulting statuses, events and dispatches.
//!
//! Run with: `cargo test --test farmer_integration`

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use farmhand::config::{FarmSettings, SettingKey, SettingsHandle};
use farmhand::events::{EventSink, FarmEvent};
use farmhand::exceptions::ExceptionRegistry;
use farmhand::farmer::{ActionLedger, FarmContext, Farmer, FarmerStatus};
use farmhand::gateway::{Collaborators, GatewayError, Loadout, Village};
use farmhand::sim::{SimCall, SimulatedWorld};
use farmhand::target::{Coord, PlayerId, Target, TargetId, VillageId};
use farmhand::watchdog::ProgressTracker;

// ============================================================================
// Test Helpers
// ============================================================================

const V1: VillageId = VillageId(1);
const V2: VillageId = VillageId(2);

/// Sink that keeps every event for inspection.
#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<FarmEvent>>,
}

impl RecordingSink {
    fn events(&self) -> Vec<FarmEvent> {
        self.events.lock().clone()
    }

    fn statuses(&self, village: VillageId) -> Vec<FarmerStatus> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                FarmEvent::StepStatus {
                    village: v, status, ..
                } if v == village => Some(status),
                _ => None,
            })
            .collect()
    }

    fn dispatched(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, FarmEvent::ActionDispatched { .. }))
            .count()
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

fn spears() -> Loadout {
    Loadout::new("spears", 500).with_units("spear", 20)
}

/// Settings without pacing so tests only wait on collaborator calls.
fn quick_settings() -> FarmSettings {
    FarmSettings {
        pacing_interval_ms: 0,
        min_attack_interval_secs: 0,
        ..Default::default()
    }
}

fn world() -> Arc<SimulatedWorld> {
    let world = SimulatedWorld::new().with_secs_per_field(60.0);
    world.add_village(village(V1, 0, 0), [("spear", 30)]);
    world.set_loadouts(vec![spears()]);
    Arc::new(world)
}

fn context(
    world: &Arc<SimulatedWorld>,
    settings: FarmSettings,
    villages: &[VillageId],
) -> (FarmContext, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let ledger = Arc::new(ActionLedger::new());
    ledger.set_villages(villages.iter().copied());
    let ctx = FarmContext {
        collaborators: Collaborators::from_world(Arc::clone(world)),
        settings: SettingsHandle::new(settings),
        exceptions: Arc::new(ExceptionRegistry::new()),
        ledger,
        progress: ProgressTracker::new(),
        sink: sink.clone(),
    };
    (ctx, sink)
}

async fn ready_farmer(ctx: &FarmContext, village: Village) -> Arc<Farmer> {
    let farmer = Arc::new(Farmer::new(village));
    farmer.init(ctx).await.unwrap();
    farmer
}

// ============================================================================
// End-to-end scenarios
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_outstanding_at_ceiling_stops_with_command_limit() {
    let world = world();
    world.add_target(Target::unclaimed(TargetId(10), Coord::new(3, 4), 100));
    let settings = FarmSettings {
        command_ceiling: 10,
        ..quick_settings()
    };
    world.set_outstanding(V1, 10);
    let (ctx, sink) = context(&world, settings, &[V1]);
    let farmer = ready_farmer(&ctx, village(V1, 0, 0)).await;

    let reason = farmer.run(&ctx, &[spears()]).await;

    assert_eq!(reason, Some(FarmerStatus::CommandLimit));
    assert!(!farmer.is_running());
    assert_eq!(farmer.status(), FarmerStatus::CommandLimit);
    assert!(world.dispatches().is_empty());
    assert!(sink.events().contains(&FarmEvent::FarmerStop {
        village: V1,
        reason: FarmerStatus::CommandLimit,
    }));
}

#[tokio::test(start_paused = true)]
async fn test_reserved_slots_lower_the_ceiling() {
    let world = world();
    world.add_target(Target::unclaimed(TargetId(10), Coord::new(3, 4), 100));
    let settings = FarmSettings {
        command_ceiling: 10,
        reserved_command_slots: 2,
        ..quick_settings()
    };
    world.set_outstanding(V1, 8);
    let (ctx, _sink) = context(&world, settings, &[V1]);
    let farmer = ready_farmer(&ctx, village(V1, 0, 0)).await;

    assert_eq!(
        farmer.run(&ctx, &[spears()]).await,
        Some(FarmerStatus::CommandLimit)
    );
}

#[tokio::test(start_paused = true)]
async fn test_second_village_sees_target_busy() {
    let world = world();
    world.add_village(village(V2, 6, 0), [("spear", 30)]);
    // Distance 5 from both villages.
    world.add_target(Target::unclaimed(TargetId(10), Coord::new(3, 4), 100));
    let settings = FarmSettings {
        allow_multiple_farmers: false,
        single_attack: true,
        ..quick_settings()
    };
    let (ctx, sink) = context(&world, settings, &[V1, V2]);
    let first = ready_farmer(&ctx, village(V1, 0, 0)).await;
    let second = ready_farmer(&ctx, village(V2, 6, 0)).await;
    assert_eq!(first.targets().len(), 1);
    assert_eq!(second.targets().len(), 1);

    assert_eq!(
        first.run(&ctx, &[spears()]).await,
        Some(FarmerStatus::TargetCycleEnd)
    );
    assert_eq!(world.dispatches().len(), 1);

    assert_eq!(
        second.run(&ctx, &[spears()]).await,
        Some(FarmerStatus::TargetCycleEnd)
    );

    assert_eq!(world.dispatches().len(), 1);
    assert_eq!(world.dispatches()[0].village, V1);
    assert!(sink.events().contains(&FarmEvent::StepStatus {
        village: V2,
        target: Some(TargetId(10)),
        status: FarmerStatus::BusyTarget,
    }));
}

#[tokio::test(start_paused = true)]
async fn test_multiple_farmers_may_share_a_target() {
    let world = world();
    world.add_village(village(V2, 6, 0), [("spear", 30)]);
    world.add_target(Target::unclaimed(TargetId(10), Coord::new(3, 4), 100));
    let settings = FarmSettings {
        allow_multiple_farmers: true,
        ..quick_settings()
    };
    let (ctx, _sink) = context(&world, settings, &[V1, V2]);
    let first = ready_farmer(&ctx, village(V1, 0, 0)).await;
    let second = ready_farmer(&ctx, village(V2, 6, 0)).await;

    first.run(&ctx, &[spears()]).await;
    second.run(&ctx, &[spears()]).await;

    let senders: Vec<VillageId> = world.dispatches().iter().map(|d| d.village).collect();
    assert_eq!(senders, vec![V1, V2]);
}

#[tokio::test(start_paused = true)]
async fn test_end_of_list_resets_cursor() {
    let world = world();
    world.add_target(Target::unclaimed(TargetId(10), Coord::new(0, 5), 100));
    world.add_target(Target::unclaimed(TargetId(11), Coord::new(0, 2), 100));
    world.set_units(V1, "spear", 100);
    let (ctx, sink) = context(&world, quick_settings(), &[V1]);
    let farmer = ready_farmer(&ctx, village(V1, 0, 0)).await;

    let order: Vec<TargetId> = farmer.targets().iter().map(|t| t.id).collect();
    assert_eq!(order, vec![TargetId(11), TargetId(10)]);

    let reason = farmer.run(&ctx, &[spears()]).await;

    assert_eq!(reason, Some(FarmerStatus::TargetCycleEnd));
    assert_eq!(farmer.cursor(), 0);
    assert_eq!(farmer.status(), FarmerStatus::TargetCycleEnd);
    let targets: Vec<TargetId> = world.dispatches().iter().map(|d| d.target).collect();
    assert_eq!(targets, vec![TargetId(11), TargetId(10)]);
    assert_eq!(sink.dispatched(), 2);
}

// ============================================================================
// Start / stop
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_uninitialized_farmer_fails_fast() {
    let world = world();
    world.add_target(Target::unclaimed(TargetId(10), Coord::new(3, 4), 100));
    let (ctx, sink) = context(&world, quick_settings(), &[V1]);
    let farmer = Farmer::new(village(V1, 0, 0));

    assert_eq!(
        farmer.run(&ctx, &[spears()]).await,
        Some(FarmerStatus::CommandError)
    );
    assert!(!farmer.is_running());
    assert_eq!(world.calls(SimCall::VillageState), 0);
    assert!(!sink
        .events()
        .iter()
        .any(|e| matches!(e, FarmEvent::FarmerStart { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_empty_target_list_fails_fast() {
    let world = world();
    let (ctx, _sink) = context(&world, quick_settings(), &[V1]);
    let farmer = ready_farmer(&ctx, village(V1, 0, 0)).await;

    assert_eq!(
        farmer.run(&ctx, &[spears()]).await,
        Some(FarmerStatus::NoTargets)
    );
}

#[tokio::test(start_paused = true)]
async fn test_init_is_shared_between_concurrent_callers() {
    let world = Arc::new(
        SimulatedWorld::new().with_latency(Duration::from_millis(100)),
    );
    world.add_village(village(V1, 0, 0), [("spear", 30)]);
    world.add_target(Target::unclaimed(TargetId(10), Coord::new(3, 4), 100));
    let (ctx, _sink) = context(&world, quick_settings(), &[V1]);
    let farmer = Farmer::new(village(V1, 0, 0));

    let (a, b) = tokio::join!(farmer.init(&ctx), farmer.init(&ctx));
    a.unwrap();
    b.unwrap();
    farmer.init(&ctx).await.unwrap();

    assert!(farmer.is_initialized());
    assert_eq!(world.calls(SimCall::LoadTargets), 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_while_running_is_a_no_op() {
    let world = Arc::new(
        SimulatedWorld::new()
            .with_secs_per_field(60.0)
            .with_latency(Duration::from_secs(1)),
    );
    world.add_village(village(V1, 0, 0), [("spear", 30)]);
    world.add_target(Target::unclaimed(TargetId(10), Coord::new(3, 4), 100));
    world.set_loadouts(vec![spears()]);
    let (ctx, _sink) = context(&world, quick_settings(), &[V1]);
    let farmer = ready_farmer(&ctx, village(V1, 0, 0)).await;

    let running = tokio::spawn({
        let farmer = Arc::clone(&farmer);
        let ctx = ctx.clone();
        async move { farmer.run(&ctx, &[spears()]).await }
    });
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(farmer.is_running());

    assert_eq!(farmer.run(&ctx, &[spears()]).await, None);

    assert_eq!(
        running.await.unwrap(),
        Some(FarmerStatus::TargetCycleEnd)
    );
    assert_eq!(world.dispatches().len(), 1);
    assert_eq!(ctx.ledger.in_flight_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_checks_prevents_dispatch() {
    let world = Arc::new(
        SimulatedWorld::new()
            .with_secs_per_field(60.0)
            .with_latency(Duration::from_secs(1)),
    );
    world.add_village(village(V1, 0, 0), [("spear", 30)]);
    world.add_target(Target::unclaimed(TargetId(10), Coord::new(3, 4), 100));
    world.set_loadouts(vec![spears()]);
    let (ctx, sink) = context(&world, quick_settings(), &[V1]);
    let farmer = ready_farmer(&ctx, village(V1, 0, 0)).await;

    let running = tokio::spawn({
        let farmer = Arc::clone(&farmer);
        let ctx = ctx.clone();
        async move { farmer.run(&ctx, &[spears()]).await }
    });
    // Inside the target state call.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    farmer.stop(FarmerStatus::UserStop);

    assert_eq!(running.await.unwrap(), Some(FarmerStatus::UserStop));
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert!(world.dispatches().is_empty());
    assert_eq!(sink.dispatched(), 0);
    assert_eq!(farmer.status(), FarmerStatus::UserStop);
    assert!(!farmer.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_dispatch_discards_the_result() {
    let world = Arc::new(
        SimulatedWorld::new()
            .with_secs_per_field(60.0)
            .with_latency(Duration::from_secs(1)),
    );
    world.add_village(village(V1, 0, 0), [("spear", 30)]);
    world.add_target(Target::unclaimed(TargetId(10), Coord::new(3, 4), 100));
    world.set_loadouts(vec![spears()]);
    let (ctx, sink) = context(&world, quick_settings(), &[V1]);
    ctx.exceptions.include(TargetId(10), None);
    let farmer = ready_farmer(&ctx, village(V1, 0, 0)).await;

    let running = tokio::spawn({
        let farmer = Arc::clone(&farmer);
        let ctx = ctx.clone();
        async move { farmer.run(&ctx, &[spears()]).await }
    });
    while farmer.status() != FarmerStatus::Attacking {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    farmer.stop(FarmerStatus::UserStop);

    assert_eq!(running.await.unwrap(), Some(FarmerStatus::UserStop));

    // The request already left; the engine must not act on its answer.
    assert_eq!(world.dispatches().len(), 1);
    assert_eq!(sink.dispatched(), 0);
    assert_eq!(
        ctx.exceptions.audit_entry(TargetId(10)).unwrap().outcome,
        None
    );
    assert!(!ctx.ledger.in_flight(V1, TargetId(10)));
}

// ============================================================================
// Rejections and faults
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_protected_target_is_skipped() {
    let world = world();
    world.add_target(Target::unclaimed(TargetId(10), Coord::new(0, 2), 100));
    world.add_target(Target::unclaimed(TargetId(11), Coord::new(0, 4), 100));
    world.set_protected(TargetId(10), true);
    let (ctx, sink) = context(&world, quick_settings(), &[V1]);
    let farmer = ready_farmer(&ctx, village(V1, 0, 0)).await;

    farmer.run(&ctx, &[spears()]).await;

    let targets: Vec<TargetId> = world.dispatches().iter().map(|d| d.target).collect();
    assert_eq!(targets, vec![TargetId(11)]);
    assert!(sink.statuses(V1).contains(&FarmerStatus::ProtectedVillage));
    // Protected targets stay in the list for the next pass.
    assert_eq!(farmer.targets().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_points_out_of_range_drops_target() {
    let world = world();
    world.add_target(Target::unclaimed(TargetId(10), Coord::new(0, 2), 100));
    world.add_target(Target::unclaimed(TargetId(11), Coord::new(0, 4), 100));
    world.set_target_points(TargetId(10), 14_000);
    let (ctx, sink) = context(&world, quick_settings(), &[V1]);
    let farmer = ready_farmer(&ctx, village(V1, 0, 0)).await;

    farmer.run(&ctx, &[spears()]).await;

    assert!(sink.statuses(V1).contains(&FarmerStatus::NotAllowedPoints));
    let remaining: Vec<TargetId> = farmer.targets().iter().map(|t| t.id).collect();
    assert_eq!(remaining, vec![TargetId(11)]);
    assert_eq!(world.dispatches().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_conquered_target_is_skipped_unless_included() {
    let world = world();
    world.add_target(Target::unclaimed(TargetId(10), Coord::new(0, 2), 100));
    let (ctx, sink) = context(&world, quick_settings(), &[V1]);
    let farmer = ready_farmer(&ctx, village(V1, 0, 0)).await;
    world.set_target_owner(TargetId(10), Some(PlayerId(7)));

    farmer.run(&ctx, &[spears()]).await;
    assert!(sink.statuses(V1).contains(&FarmerStatus::AbandonedConquered));
    assert!(world.dispatches().is_empty());

    ctx.exceptions.include(TargetId(10), None);
    farmer.run(&ctx, &[spears()]).await;
    assert_eq!(world.dispatches().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_vanished_target_is_dropped() {
    let world = world();
    world.add_target(Target::unclaimed(TargetId(10), Coord::new(0, 2), 100));
    let (ctx, sink) = context(&world, quick_settings(), &[V1]);
    let farmer = ready_farmer(&ctx, village(V1, 0, 0)).await;
    world.remove_target(TargetId(10));

    assert_eq!(
        farmer.run(&ctx, &[spears()]).await,
        Some(FarmerStatus::NoTargets)
    );
    assert!(sink.statuses(V1).contains(&FarmerStatus::AbandonedConquered));
    assert!(farmer.targets().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_slow_loadout_is_a_time_limit() {
    let world = world();
    world.add_target(Target::unclaimed(TargetId(10), Coord::new(3, 4), 100));
    // 5 fields × 60 s there and back is 600 s.
    let settings = FarmSettings {
        max_travel_time_secs: 300,
        ..quick_settings()
    };
    let (ctx, sink) = context(&world, settings, &[V1]);
    let farmer = ready_farmer(&ctx, village(V1, 0, 0)).await;

    assert_eq!(
        farmer.run(&ctx, &[spears()]).await,
        Some(FarmerStatus::TargetCycleEnd)
    );
    assert!(sink.statuses(V1).contains(&FarmerStatus::TimeLimit));
    assert!(world.dispatches().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_missing_units_stop_the_turn() {
    let world = world();
    world.add_target(Target::unclaimed(TargetId(10), Coord::new(3, 4), 100));
    world.set_units(V1, "spear", 5);
    let (ctx, _sink) = context(&world, quick_settings(), &[V1]);
    let farmer = ready_farmer(&ctx, village(V1, 0, 0)).await;

    assert_eq!(
        farmer.run(&ctx, &[spears()]).await,
        Some(FarmerStatus::NoUnits)
    );
}

#[tokio::test(start_paused = true)]
async fn test_full_storage_stops_when_enabled() {
    use farmhand::gateway::Resources;

    let world = world();
    world.add_target(Target::unclaimed(TargetId(10), Coord::new(3, 4), 100));
    world.set_resources(V1, Resources::new(1_000, 1_000, 1_000), 1_000);
    let (ctx, _sink) = context(&world, quick_settings(), &[V1]);
    let farmer = ready_farmer(&ctx, village(V1, 0, 0)).await;

    assert_eq!(
        farmer.run(&ctx, &[spears()]).await,
        Some(FarmerStatus::FullStorage)
    );

    ctx.settings.update(FarmSettings {
        check_full_storage: false,
        ..quick_settings()
    });
    assert_eq!(
        farmer.run(&ctx, &[spears()]).await,
        Some(FarmerStatus::TargetCycleEnd)
    );
    assert_eq!(world.dispatches().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_hung_step_expires_and_retries() {
    let world = world();
    world.add_target(Target::unclaimed(TargetId(10), Coord::new(3, 4), 100));
    world.hang_next(SimCall::TargetState);
    let settings = FarmSettings {
        step_timeout_secs: 1,
        ..quick_settings()
    };
    let (ctx, sink) = context(&world, settings, &[V1]);
    let farmer = ready_farmer(&ctx, village(V1, 0, 0)).await;

    assert_eq!(
        farmer.run(&ctx, &[spears()]).await,
        Some(FarmerStatus::TargetCycleEnd)
    );
    assert!(sink.statuses(V1).contains(&FarmerStatus::ExpiredStep));
    assert_eq!(world.dispatches().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_error_stops_with_command_error() {
    let world = world();
    world.add_target(Target::unclaimed(TargetId(10), Coord::new(3, 4), 100));
    world.fail_next(SimCall::Dispatch, GatewayError::Rejected("captcha".into()));
    let (ctx, sink) = context(&world, quick_settings(), &[V1]);
    ctx.exceptions.include(TargetId(10), None);
    let farmer = ready_farmer(&ctx, village(V1, 0, 0)).await;

    assert_eq!(
        farmer.run(&ctx, &[spears()]).await,
        Some(FarmerStatus::CommandError)
    );
    assert!(sink.events().contains(&FarmEvent::FarmerStop {
        village: V1,
        reason: FarmerStatus::CommandError,
    }));
    assert!(!ctx.ledger.in_flight(V1, TargetId(10)));
    let outcome = ctx.exceptions.audit_entry(TargetId(10)).unwrap().outcome;
    assert!(outcome.unwrap().contains("captcha"));
}

#[tokio::test(start_paused = true)]
async fn test_remote_check_blocks_when_villages_are_unknown() {
    let world = world();
    world.add_village(village(V2, 6, 0), [("spear", 30)]);
    world.add_target(Target::unclaimed(TargetId(10), Coord::new(3, 4), 100));
    // V2 does not report its actions; the local ledger cannot decide.
    world.set_reports_actions(V2, false);
    world.inject_action(V2, TargetId(10), Duration::from_secs(120));
    let (ctx, sink) = context(&world, quick_settings(), &[V1, V2]);
    let farmer = ready_farmer(&ctx, village(V1, 0, 0)).await;
    ready_farmer(&ctx, village(V2, 6, 0)).await;

    farmer.run(&ctx, &[spears()]).await;

    assert_eq!(world.calls(SimCall::IncomingActions), 1);
    assert!(sink.statuses(V1).contains(&FarmerStatus::BusyTarget));
    assert!(world.dispatches().is_empty());
}

// ============================================================================
// Minimum re-attack interval
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_recent_attack_blocks_until_interval_allows() {
    let world = world();
    // Distance 5: a 300s trip.
    world.add_target(Target::unclaimed(TargetId(10), Coord::new(3, 4), 100));
    world.inject_action(V1, TargetId(10), Duration::from_secs(60));
    // Landed at 60s, home at 120s.
    tokio::time::sleep(Duration::from_secs(90)).await;

    let settings = FarmSettings {
        min_attack_interval_secs: 600,
        ..quick_settings()
    };
    let (ctx, sink) = context(&world, settings, &[V1]);
    let farmer = ready_farmer(&ctx, village(V1, 0, 0)).await;

    let reason = farmer.run(&ctx, &[spears()]).await;

    assert_eq!(reason, Some(FarmerStatus::TargetCycleEnd));
    assert!(sink.statuses(V1).contains(&FarmerStatus::BusyTarget));
    assert!(world.dispatches().is_empty());
    assert_eq!(sink.dispatched(), 0);

    // The new arrival lands 300s after the previous one.
    ctx.settings
        .set(SettingKey::MinAttackIntervalSecs, "120")
        .unwrap();
    farmer.run(&ctx, &[spears()]).await;

    let targets: Vec<TargetId> = world.dispatches().iter().map(|d| d.target).collect();
    assert_eq!(targets, vec![TargetId(10)]);
}

#[tokio::test(start_paused = true)]
async fn test_single_attack_counts_other_villages_recent_attacks() {
    let world = world();
    world.add_village(village(V2, 6, 0), [("spear", 30)]);
    world.add_target(Target::unclaimed(TargetId(10), Coord::new(3, 4), 100));
    world.inject_action(V1, TargetId(10), Duration::from_secs(60));
    tokio::time::sleep(Duration::from_secs(90)).await;

    let settings = FarmSettings {
        allow_multiple_farmers: false,
        single_attack: true,
        min_attack_interval_secs: 600,
        ..quick_settings()
    };
    let (ctx, sink) = context(&world, settings, &[V1, V2]);
    ready_farmer(&ctx, village(V1, 0, 0)).await;
    let second = ready_farmer(&ctx, village(V2, 6, 0)).await;

    second.run(&ctx, &[spears()]).await;

    assert!(sink.statuses(V2).contains(&FarmerStatus::BusyTarget));
    assert!(world.dispatches().is_empty());

    // Without single attack only the village's own history counts.
    ctx.settings.set(SettingKey::SingleAttack, "false").unwrap();
    second.run(&ctx, &[spears()]).await;

    let senders: Vec<VillageId> = world.dispatches().iter().map(|d| d.village).collect();
    assert_eq!(senders, vec![V2]);
}
