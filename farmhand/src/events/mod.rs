//! Engine events and the bounded event log.
//!
//! The engine emits [`FarmEvent`]s through an [`EventSink`] and never renders
//! them itself. A UI reads the [`EventLog`], logging goes through
//! [`TracingEventSink`], and [`MultiplexEventSink`] fans out to several.
//!
//! ```
//! use std::sync::Arc;
//! use farmhand::events::{EventLog, EventSink, FarmEvent, LogKind};
//!
//! let log = Arc::new(EventLog::new(100));
//! log.emit(FarmEvent::EngineStarted { farmers: 2 });
//! assert_eq!(log.entries()[0].kind, LogKind::EngineStarted);
//! ```

mod event;
mod log;
mod sink;

pub use event::FarmEvent;
pub use log::{EventLog, LogEntry, LogKind};
pub use sink::{EventSink, MultiplexEventSink, NullEventSink, TracingEventSink};
