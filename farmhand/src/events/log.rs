//! Bounded, append-only event log for UI consumption.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::event::FarmEvent;
use super::sink::EventSink;
use crate::config::{SettingsHandle, MAX_EVENT_LOG_CAPACITY, MIN_EVENT_LOG_CAPACITY};
use crate::exceptions::ExceptionChangeKind;
use crate::target::{TargetId, VillageId};

/// Capacity of the appended-entry broadcast channel.
const APPEND_CHANNEL_CAPACITY: usize = 1024;

/// Kind of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    EngineStarted,
    EngineStopped,
    EngineHalted,
    EngineRestarted,
    CycleBegin,
    CycleEnd,
    FarmerStart,
    FarmerStop,
    StepStatus,
    ActionDispatched,
    ExceptionChanged,
}

/// A single log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: LogKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub village: Option<VillageId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetId>,
    /// Human readable detail (status, reason, action id, ...).
    pub detail: String,
}

impl LogEntry {
    /// Builds the entry for an event, stamped now.
    pub fn from_event(event: &FarmEvent) -> Self {
        let (kind, detail) = match event {
            FarmEvent::EngineStarted { farmers } => {
                (LogKind::EngineStarted, format!("{farmers} farmers"))
            }
            FarmEvent::EngineStopped => (LogKind::EngineStopped, String::new()),
            FarmEvent::EngineHalted { reason } => (LogKind::EngineHalted, reason.clone()),
            FarmEvent::EngineRestarted {
                stalled_for,
                restarts,
            } => (
                LogKind::EngineRestarted,
                format!("stalled {}s, restart #{restarts}", stalled_for.as_secs()),
            ),
            FarmEvent::CycleBegin { farmers } => {
                (LogKind::CycleBegin, format!("{farmers} farmers"))
            }
            FarmEvent::CycleEnd { next_cycle_at } => {
                (LogKind::CycleEnd, next_cycle_at.to_rfc3339())
            }
            FarmEvent::FarmerStart { .. } => (LogKind::FarmerStart, String::new()),
            FarmEvent::FarmerStop { reason, .. } => (LogKind::FarmerStop, reason.to_string()),
            FarmEvent::StepStatus { status, .. } => (LogKind::StepStatus, status.to_string()),
            FarmEvent::ActionDispatched { action, .. } => {
                (LogKind::ActionDispatched, action.to_string())
            }
            FarmEvent::ExceptionChanged(change) => {
                let verb = match change.kind {
                    ExceptionChangeKind::Added => "added to",
                    ExceptionChangeKind::Removed => "removed from",
                };
                (LogKind::ExceptionChanged, format!("{verb} {}", change.set))
            }
        };
        Self {
            timestamp: Utc::now(),
            kind,
            village: event.village(),
            target: event.target(),
            detail,
        }
    }
}

/// Size-bounded event log; the oldest entries are discarded first.
pub struct EventLog {
    inner: Mutex<LogInner>,
    appended: broadcast::Sender<LogEntry>,
}

struct LogInner {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl LogInner {
    fn trim(&mut self) {
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }
}

impl EventLog {
    /// Creates a log holding at most `capacity` entries (clamped to bounds).
    pub fn new(capacity: usize) -> Self {
        let (appended, _) = broadcast::channel(APPEND_CHANNEL_CAPACITY);
        Self {
            inner: Mutex::new(LogInner {
                entries: VecDeque::new(),
                capacity: clamp_capacity(capacity),
            }),
            appended,
        }
    }

    /// Appends an entry, trimming the oldest if over capacity.
    pub fn append(&self, entry: LogEntry) {
        {
            let mut inner = self.inner.lock();
            inner.entries.push_back(entry.clone());
            inner.trim();
        }
        let _ = self.appended.send(entry);
    }

    /// Copies the current entries, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.inner.lock().entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    /// Changes the capacity, trimming immediately if it shrank.
    pub fn set_capacity(&self, capacity: usize) {
        let mut inner = self.inner.lock();
        inner.capacity = clamp_capacity(capacity);
        inner.trim();
    }

    /// Subscribes to appended entries.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.appended.subscribe()
    }

    /// Keeps the capacity in step with `events.log_capacity` until `cancel`
    /// fires.
    pub async fn follow_settings(self: Arc<Self>, settings: SettingsHandle, cancel: CancellationToken) {
        let mut revision = settings.subscribe();
        loop {
            self.set_capacity(settings.snapshot().event_log_capacity);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                changed = revision.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

fn clamp_capacity(capacity: usize) -> usize {
    crate::config::clamp_setting(
        "event_log_capacity",
        capacity,
        MIN_EVENT_LOG_CAPACITY,
        MAX_EVENT_LOG_CAPACITY,
    )
}

impl EventSink for EventLog {
    fn emit(&self, event: FarmEvent) {
        self.append(LogEntry::from_event(&event));
    }
}

impl fmt::Debug for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("EventLog")
            .field("len", &inner.entries.len())
            .field("capacity", &inner.capacity)
            .finish()
    }
}
