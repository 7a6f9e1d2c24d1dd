//! Supervisor task: runs the scheduler and restarts it after stalls.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::error::EngineError;
use crate::events::FarmEvent;
use crate::farmer::FarmContext;
use crate::scheduler::{CycleScheduler, SchedulerExit};
use crate::watchdog::Stall;

/// Delay between a stall and the restart.
pub const RESTART_DELAY: Duration = Duration::from_secs(5);

/// What woke the supervisor.
#[derive(Debug)]
enum Wake {
    Shutdown,
    Stall(Stall),
    Exit(SchedulerExit),
}

pub(super) struct Supervisor {
    pub scheduler: CycleScheduler,
    pub ctx: FarmContext,
    pub stalls: mpsc::Receiver<Stall>,
    pub shutdown: CancellationToken,
    pub restart_delay: Duration,
    pub restarts: Arc<AtomicU64>,
}

impl Supervisor {
    /// Runs until shutdown, a user stop or a halt. Returns the halt cause.
    pub async fn run(mut self) -> Option<EngineError> {
        loop {
            let wake = self.run_scheduler().await;
            self.scheduler.stop();

            match wake {
                Wake::Shutdown
                | Wake::Exit(SchedulerExit::Interrupted)
                | Wake::Exit(SchedulerExit::UserStop) => {
                    self.ctx.sink.emit(FarmEvent::EngineStopped);
                    return None;
                }
                Wake::Exit(SchedulerExit::Halted(error)) => {
                    warn!(error = %error, "Farming engine halted");
                    self.ctx.sink.emit(FarmEvent::EngineHalted {
                        reason: error.to_string(),
                    });
                    return Some(error);
                }
                Wake::Stall(stall) => {
                    tokio::select! {
                        biased;
                        _ = self.shutdown.cancelled() => {
                            self.ctx.sink.emit(FarmEvent::EngineStopped);
                            return None;
                        }
                        _ = tokio::time::sleep(self.restart_delay) => {}
                    }
                    let restarts = self.restarts.fetch_add(1, Ordering::Relaxed) + 1;
                    self.ctx.progress.touch();
                    info!(restarts, "Restarting farming engine after stall");
                    self.ctx.sink.emit(FarmEvent::EngineRestarted {
                        stalled_for: stall.idle_for,
                        restarts,
                    });
                }
            }
        }
    }

    /// Races the scheduler against shutdown and stalls.
    ///
    /// On shutdown or stall the scheduler is interrupted and given
    /// `restart_delay` to wind down before it is dropped.
    async fn run_scheduler(&mut self) -> Wake {
        let interrupt = CancellationToken::new();
        let run = self.scheduler.run(&interrupt);
        tokio::pin!(run);

        let wake = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Wake::Shutdown,
            Some(stall) = self.stalls.recv() => Wake::Stall(stall),
            exit = &mut run => Wake::Exit(exit),
        };

        if !matches!(wake, Wake::Exit(_)) {
            interrupt.cancel();
            if tokio::time::timeout(self.restart_delay, &mut run).await.is_err() {
                warn!("Scheduler did not wind down in time, abandoning in-flight step");
            }
        }
        wake
    }
}
