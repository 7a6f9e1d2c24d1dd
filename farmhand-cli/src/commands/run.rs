//! Run command: farm a simulated world for a fixed duration.
//!
//! Generates a seeded world, starts the engine against it and prints a
//! report once the duration elapses, the engine stops on its own, or the
//! user presses Ctrl+C.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use farmhand::config::SettingsHandle;
use farmhand::engine::{EngineSnapshot, FarmEngine};
use farmhand::events::{EventLog, EventSink, LogEntry, MultiplexEventSink, TracingEventSink};
use farmhand::exceptions::ExceptionRegistry;
use farmhand::gateway::Collaborators;
use farmhand::sim::{generate_world, DispatchRecord, WorldSpec};
use farmhand::target::{TargetId, VillageId};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the run command.
#[derive(Debug, Clone)]
pub struct RunArgs {
    pub config: Option<PathBuf>,
    pub villages: usize,
    pub targets: usize,
    pub seed: u64,
    /// Seconds to farm before stopping.
    pub duration: u64,
    pub debug: bool,
    /// Print the report as JSON.
    pub json: bool,
}

/// One dispatched action, as reported.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchSummary {
    pub action: String,
    pub village: VillageId,
    pub target: TargetId,
    pub loadout: String,
    pub travel_secs: u64,
}

impl From<&DispatchRecord> for DispatchSummary {
    fn from(record: &DispatchRecord) -> Self {
        Self {
            action: record.action.to_string(),
            village: record.village,
            target: record.target,
            loadout: record.loadout.clone(),
            travel_secs: record.arrival.saturating_duration_since(record.sent_at).as_secs(),
        }
    }
}

/// Final state printed when the run ends.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub engine: EngineSnapshot,
    pub dispatches: Vec<DispatchSummary>,
    pub events: Vec<LogEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halted: Option<String>,
}

/// Run the engine against a generated world.
pub fn run(args: RunArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(args.config.as_deref(), args.debug, !args.json)?;
    runner.log_startup("run");
    let settings = runner.config().farm.clone();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    // Set up signal handler for graceful shutdown
    let shutdown = CancellationToken::new();
    let shutdown_clone = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_clone.cancel();
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let report = runtime.block_on(async move {
        let spec = WorldSpec {
            villages: args.villages,
            targets: args.targets,
            seed: args.seed,
        };
        let world = Arc::new(generate_world(&spec));
        info!(
            villages = spec.villages,
            targets = spec.targets,
            seed = spec.seed,
            "Simulated world generated"
        );

        let log = Arc::new(EventLog::new(settings.event_log_capacity));
        let sink: Arc<dyn EventSink> = Arc::new(MultiplexEventSink::new(vec![
            Arc::new(TracingEventSink) as Arc<dyn EventSink>,
            Arc::clone(&log) as Arc<dyn EventSink>,
        ]));

        let settings = SettingsHandle::new(settings);
        let log_follow = shutdown.child_token();
        let follower = tokio::spawn(
            Arc::clone(&log).follow_settings(settings.clone(), log_follow.clone()),
        );

        let engine = FarmEngine::new(
            Collaborators::from_world(Arc::clone(&world)),
            settings,
            Arc::new(ExceptionRegistry::new()),
            sink,
        );
        if let Err(e) = engine.start().await {
            log_follow.cancel();
            let _ = follower.await;
            return Err(CliError::from(e));
        }

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(args.duration)) => {
                info!("Run duration elapsed");
            }
            _ = engine.wait() => {
                info!("Engine stopped on its own");
            }
            _ = shutdown.cancelled() => {
                info!("Interrupted, shutting down");
            }
        }

        let halted = match engine.stop().await {
            Ok(()) => None,
            Err(e) => {
                warn!(error = %e, "Engine halted");
                Some(e.to_string())
            }
        };
        log_follow.cancel();
        if let Err(e) = follower.await {
            warn!(error = %e, "Event log settings task failed");
        }

        Ok::<_, CliError>(RunReport {
            engine: engine.snapshot(),
            dispatches: world.dispatches().iter().map(DispatchSummary::from).collect(),
            events: log.entries(),
            halted,
        })
    })?;

    if args.json {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::Output(e.to_string()))?;
        println!("{}", json);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    println!();
    println!("Farming Report");
    println!("==============");
    println!();
    println!("  Completed cycles: {}", report.engine.completed_cycles);
    println!("  Restarts:         {}", report.engine.restarts);
    println!("  Dispatches:       {}", report.dispatches.len());
    if let Some(reason) = &report.halted {
        println!("  Halted:           {}", reason);
    }
    println!();

    println!("Farmers");
    println!("-------");
    for farmer in &report.engine.farmers {
        println!(
            "  {:<8} {:<20} {:<16} cursor {}/{}",
            farmer.village.to_string(),
            farmer.name,
            farmer.status.to_string(),
            farmer.cursor,
            farmer.targets
        );
    }
    println!();

    let mut per_village: Vec<(VillageId, usize)> = Vec::new();
    for dispatch in &report.dispatches {
        match per_village.iter_mut().find(|(v, _)| *v == dispatch.village) {
            Some((_, count)) => *count += 1,
            None => per_village.push((dispatch.village, 1)),
        }
    }
    if !per_village.is_empty() {
        println!("Dispatches per village");
        println!("----------------------");
        for (village, count) in per_village {
            println!("  {:<8} {}", village.to_string(), count);
        }
        println!();
    }

    println!("Last events");
    println!("-----------");
    let skip = report.events.len().saturating_sub(20);
    for entry in report.events.iter().skip(skip) {
        let subject = match (entry.village, entry.target) {
            (Some(v), Some(t)) => format!("{} -> {}", v, t),
            (Some(v), None) => v.to_string(),
            _ => String::new(),
        };
        println!(
            "  {} {:?} {} {}",
            entry.timestamp.format("%H:%M:%S"),
            entry.kind,
            subject,
            entry.detail
        );
    }
}
