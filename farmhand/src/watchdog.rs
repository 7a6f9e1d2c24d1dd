//! Stall detection watchdog.
//!
//! Every Farmer start and step transition touches a shared
//! [`ProgressTracker`]. The [`StallWatchdog`] polls it and signals the engine
//! supervisor when no progress was seen for longer than the stall threshold
//! (cycle pause × 1.5 + pacing interval). The supervisor does the restart.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::SettingsHandle;

/// Default watchdog poll interval.
pub const WATCHDOG_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Shared "last progress" timestamp.
///
/// Stored as milliseconds since the tracker's origin, plus one, so that zero
/// means "never touched". Clones share the same timestamp.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    origin: Instant,
    last_ms: Arc<AtomicU64>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            last_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Records progress now.
    pub fn touch(&self) {
        let elapsed = self.origin.elapsed().as_millis() as u64;
        self.last_ms.store(elapsed + 1, Ordering::Relaxed);
    }

    /// Instant of the last recorded progress, or the origin if none yet.
    pub fn last_progress(&self) -> Instant {
        match self.last_ms.load(Ordering::Relaxed) {
            0 => self.origin,
            ms => self.origin + Duration::from_millis(ms - 1),
        }
    }

    /// Time since the last recorded progress.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_progress())
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns true if the gap since `last` strictly exceeds `threshold`.
pub fn is_stalled(now: Instant, last: Instant, threshold: Duration) -> bool {
    now.saturating_duration_since(last) > threshold
}

/// Stall signal sent to the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stall {
    /// How long no progress had been observed.
    pub idle_for: Duration,
}

/// Periodic liveness check over a [`ProgressTracker`].
pub struct StallWatchdog {
    progress: ProgressTracker,
    settings: SettingsHandle,
    interval: Duration,
    stalls: mpsc::Sender<Stall>,
}

impl StallWatchdog {
    pub fn new(
        progress: ProgressTracker,
        settings: SettingsHandle,
        stalls: mpsc::Sender<Stall>,
    ) -> Self {
        Self {
            progress,
            settings,
            interval: WATCHDOG_POLL_INTERVAL,
            stalls,
        }
    }

    /// Overrides the poll interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Runs the watchdog until cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }

            if let Some(stall) = self.check_health(Instant::now()) {
                if self.stalls.send(stall).await.is_err() {
                    break;
                }
                // Restart the clock so one stall is reported once.
                self.progress.touch();
            }
        }
    }

    /// Returns a stall if the engine has made no progress for too long.
    fn check_health(&self, now: Instant) -> Option<Stall> {
        let threshold = self.settings.snapshot().stall_threshold();
        let last = self.progress.last_progress();
        let idle_for = now.saturating_duration_since(last);

        if is_stalled(now, last, threshold) {
            warn!(
                idle_ms = idle_for.as_millis() as u64,
                threshold_ms = threshold.as_millis() as u64,
                "STALL DETECTED: no farming progress for {}s",
                idle_for.as_secs()
            );
            Some(Stall { idle_for })
        } else {
            debug!(
                idle_ms = idle_for.as_millis() as u64,
                "Stall watchdog: engine healthy"
            );
            None
        }
    }
}

impl std::fmt::Debug for StallWatchdog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StallWatchdog")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FarmSettings;

    const EPSILON: Duration = Duration::from_millis(1);

    fn settings() -> SettingsHandle {
        SettingsHandle::new(FarmSettings {
            cycle_pause_secs: 10,
            pacing_interval_ms: 1000,
            step_timeout_secs: 1,
            ..Default::default()
        })
    }

    #[test]
    fn test_is_stalled_is_strict() {
        let last = Instant::now();
        let threshold = Duration::from_secs(16);
        assert!(!is_stalled(last + threshold - EPSILON, last, threshold));
        assert!(!is_stalled(last + threshold, last, threshold));
        assert!(is_stalled(last + threshold + EPSILON, last, threshold));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tracker_touch_and_idle() {
        let tracker = ProgressTracker::new();
        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(tracker.idle_for(Instant::now()), Duration::from_secs(3));

        tracker.touch();
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(tracker.idle_for(Instant::now()), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_health_threshold_boundaries() {
        let (tx, _rx) = mpsc::channel(1);
        let progress = ProgressTracker::new();
        progress.touch();
        let watchdog = StallWatchdog::new(progress.clone(), settings(), tx);
        let threshold = Duration::from_secs(16);
        let last = progress.last_progress();

        assert!(watchdog.check_health(last + threshold - EPSILON).is_none());
        let stall = watchdog.check_health(last + threshold + EPSILON).unwrap();
        assert_eq!(stall.idle_for, threshold + EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_signals_stall_once() {
        let (tx, mut rx) = mpsc::channel(4);
        let progress = ProgressTracker::new();
        progress.touch();
        let shutdown = CancellationToken::new();
        let watchdog = StallWatchdog::new(progress.clone(), settings(), tx)
            .with_interval(Duration::from_secs(1));
        let handle = tokio::spawn(watchdog.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(3)).await;
        let stall = rx.recv().await.unwrap();
        assert!(stall.idle_for > Duration::from_secs(16));
        assert!(rx.try_recv().is_err());

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_watchdog_stops_on_cancellation() {
        let (tx, _rx) = mpsc::channel(1);
        let shutdown = CancellationToken::new();
        let watchdog = StallWatchdog::new(ProgressTracker::new(), settings(), tx);

        shutdown.cancel();

        let result = tokio::time::timeout(Duration::from_millis(100), watchdog.run(shutdown)).await;
        assert!(result.is_ok());
    }
}
