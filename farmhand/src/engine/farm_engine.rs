//! `FarmEngine`: construction, start/stop and snapshots.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::error::EngineError;
use super::supervisor::{Supervisor, RESTART_DELAY};
use crate::config::SettingsHandle;
use crate::events::{EventSink, FarmEvent};
use crate::exceptions::ExceptionRegistry;
use crate::farmer::{ActionLedger, FarmContext, FarmerSnapshot};
use crate::gateway::Collaborators;
use crate::scheduler::{CycleScheduler, SchedulerView};
use crate::watchdog::{ProgressTracker, StallWatchdog, WATCHDOG_POLL_INTERVAL};

/// Point-in-time view of the engine, for UIs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineSnapshot {
    pub running: bool,
    /// Index of the active Farmer.
    pub index: usize,
    pub next_cycle_at: Option<DateTime<Utc>>,
    pub completed_cycles: u64,
    /// Watchdog restarts since the engine was created.
    pub restarts: u64,
    pub farmers: Vec<FarmerSnapshot>,
}

struct Running {
    shutdown: CancellationToken,
    /// Cancelled by the supervisor when it exits for any reason.
    done: CancellationToken,
    supervisor: JoinHandle<Option<EngineError>>,
    watchdog: JoinHandle<()>,
}

/// The farming engine.
pub struct FarmEngine {
    ctx: FarmContext,
    restart_delay: Duration,
    watchdog_interval: Duration,
    restarts: Arc<AtomicU64>,
    running: Mutex<Option<Running>>,
    view: Mutex<Option<SchedulerView>>,
}

impl FarmEngine {
    pub fn new(
        collaborators: Collaborators,
        settings: SettingsHandle,
        exceptions: Arc<ExceptionRegistry>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            ctx: FarmContext {
                collaborators,
                settings,
                exceptions,
                ledger: Arc::new(ActionLedger::new()),
                progress: ProgressTracker::new(),
                sink,
            },
            restart_delay: RESTART_DELAY,
            watchdog_interval: WATCHDOG_POLL_INTERVAL,
            restarts: Arc::new(AtomicU64::new(0)),
            running: Mutex::new(None),
            view: Mutex::new(None),
        }
    }

    /// Overrides the delay between a stall and the restart.
    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }

    /// Overrides the watchdog poll interval.
    pub fn with_watchdog_interval(mut self, interval: Duration) -> Self {
        self.watchdog_interval = interval;
        self
    }

    pub fn settings(&self) -> &SettingsHandle {
        &self.ctx.settings
    }

    pub fn exceptions(&self) -> &Arc<ExceptionRegistry> {
        &self.ctx.exceptions
    }

    pub fn ledger(&self) -> &Arc<ActionLedger> {
        &self.ctx.ledger
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.ctx.progress
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Starts farming.
    ///
    /// Seeds the exception registry from the group collaborator, loads the
    /// owned villages and spawns the supervisor and watchdog tasks.
    pub async fn start(&self) -> Result<(), EngineError> {
        if self.is_running() {
            return Err(EngineError::AlreadyRunning);
        }

        let groups = self.ctx.collaborators.exception_groups.current().await?;
        self.ctx.exceptions.replace_all(groups);
        let villages = self.ctx.collaborators.villages.owned_villages().await?;

        let mut scheduler = CycleScheduler::new(self.ctx.clone());
        scheduler.prime(villages);
        let view = scheduler.view();
        let farmers = view.len();

        let shutdown = CancellationToken::new();
        let done = CancellationToken::new();
        let (stall_tx, stall_rx) = mpsc::channel(1);

        self.ctx.progress.touch();
        let watchdog = StallWatchdog::new(self.ctx.progress.clone(), self.ctx.settings.clone(), stall_tx)
            .with_interval(self.watchdog_interval);
        let watchdog_stop = shutdown.child_token();
        let watchdog = tokio::spawn(watchdog.run(watchdog_stop.clone()));

        let supervisor = Supervisor {
            scheduler,
            ctx: self.ctx.clone(),
            stalls: stall_rx,
            shutdown: shutdown.clone(),
            restart_delay: self.restart_delay,
            restarts: Arc::clone(&self.restarts),
        };
        let supervisor_done = done.clone();
        let supervisor = tokio::spawn(async move {
            let outcome = supervisor.run().await;
            watchdog_stop.cancel();
            supervisor_done.cancel();
            outcome
        });

        {
            let mut running = self.running.lock();
            if running.as_ref().is_some_and(|r| !r.done.is_cancelled()) {
                shutdown.cancel();
                return Err(EngineError::AlreadyRunning);
            }
            *running = Some(Running {
                shutdown,
                done,
                supervisor,
                watchdog,
            });
        }
        *self.view.lock() = Some(view);

        info!(farmers, "Farming engine started");
        self.ctx.sink.emit(FarmEvent::EngineStarted { farmers });
        Ok(())
    }

    /// Stops farming and waits for the engine tasks to finish.
    ///
    /// Returns the halt cause if the engine had already stopped itself.
    pub async fn stop(&self) -> Result<(), EngineError> {
        let Some(running) = self.running.lock().take() else {
            return Ok(());
        };
        running.shutdown.cancel();

        let outcome = match running.supervisor.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Supervisor task failed");
                None
            }
        };
        if let Err(e) = running.watchdog.await {
            warn!(error = %e, "Watchdog task failed");
        }

        match outcome {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Waits until the engine stops on its own (halt or user stop) or is
    /// stopped. Returns immediately if it is not running.
    pub async fn wait(&self) {
        let done = self.running.lock().as_ref().map(|r| r.done.clone());
        if let Some(done) = done {
            done.cancelled().await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|r| !r.done.is_cancelled())
    }

    /// Current engine state.
    pub fn snapshot(&self) -> EngineSnapshot {
        let running = self.is_running();
        let restarts = self.restarts.load(Ordering::Relaxed);
        match self.view.lock().as_ref() {
            Some(view) => EngineSnapshot {
                running,
                index: view.index(),
                next_cycle_at: view.next_cycle_at(),
                completed_cycles: view.completed_cycles(),
                restarts,
                farmers: view.farmer_snapshots(),
            },
            None => EngineSnapshot {
                running,
                index: 0,
                next_cycle_at: None,
                completed_cycles: 0,
                restarts,
                farmers: Vec::new(),
            },
        }
    }
}

impl std::fmt::Debug for FarmEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FarmEngine")
            .field("running", &self.is_running())
            .field("restarts", &self.restarts.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
