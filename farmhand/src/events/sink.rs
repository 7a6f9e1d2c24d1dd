//! Event sinks.

use std::sync::Arc;

use super::event::FarmEvent;

// =============================================================================
// Event Sink Trait
// =============================================================================

/// Receiver of engine events.
///
/// `emit` is called from the engine task and must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: FarmEvent);
}

// =============================================================================
// Built-in Sink Implementations
// =============================================================================

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: FarmEvent) {}
}

/// Sink that logs events using the `tracing` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: FarmEvent) {
        match &event {
            FarmEvent::EngineStarted { farmers } => {
                tracing::info!(farmers, "Farming engine started");
            }
            FarmEvent::EngineStopped => {
                tracing::info!("Farming engine stopped");
            }
            FarmEvent::EngineHalted { reason } => {
                tracing::warn!(reason = %reason, "Farming engine halted");
            }
            FarmEvent::EngineRestarted {
                stalled_for,
                restarts,
            } => {
                tracing::warn!(
                    stalled_ms = stalled_for.as_millis() as u64,
                    restarts,
                    "Farming engine restarted after stall"
                );
            }
            FarmEvent::CycleBegin { farmers } => {
                tracing::info!(farmers, "Cycle begin");
            }
            FarmEvent::CycleEnd { next_cycle_at } => {
                tracing::info!(next_cycle_at = %next_cycle_at, "Cycle end");
            }
            FarmEvent::FarmerStart { village } => {
                tracing::info!(village = %village, "Farmer start");
            }
            FarmEvent::FarmerStop { village, reason } => {
                if *reason == crate::farmer::FarmerStatus::CommandError {
                    tracing::warn!(village = %village, reason = %reason, "Farmer stop");
                } else {
                    tracing::info!(village = %village, reason = %reason, "Farmer stop");
                }
            }
            FarmEvent::StepStatus {
                village,
                target,
                status,
            } => match target {
                Some(target) => tracing::debug!(
                    village = %village,
                    target = %target,
                    status = %status,
                    "Step status"
                ),
                None => tracing::debug!(village = %village, status = %status, "Step status"),
            },
            FarmEvent::ActionDispatched {
                village,
                target,
                action,
            } => {
                tracing::debug!(
                    village = %village,
                    target = %target,
                    action = %action,
                    "Action dispatched"
                );
            }
            FarmEvent::ExceptionChanged(change) => {
                tracing::debug!(
                    target = %change.target,
                    set = %change.set,
                    change = ?change.kind,
                    "Exception changed"
                );
            }
        }
    }
}

/// Sink that forwards events to multiple sinks.
pub struct MultiplexEventSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl MultiplexEventSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }

    /// Adds a sink to the multiplex.
    pub fn add_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }
}

impl EventSink for MultiplexEventSink {
    fn emit(&self, event: FarmEvent) {
        for sink in &self.sinks {
            sink.emit(event.clone());
        }
    }
}

impl std::fmt::Debug for MultiplexEventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiplexEventSink")
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}
