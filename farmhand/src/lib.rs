//! farmhand - a multi-village farming scheduler.
//!
//! Each owned village gets a [`farmer::Farmer`]: a step state machine that
//! walks a sorted target list, checks every precondition (command
//! capacity, storage, target ownership and protection, army sufficiency,
//! busy targets) and dispatches one action per step. A
//! [`scheduler::CycleScheduler`] runs the Farmers one at a time in a
//! round-robin cycle, and a [`watchdog::StallWatchdog`] restarts the
//! engine when progress stops.
//!
//! Everything outside the engine (map data, villages, armies, dispatch,
//! exception groups) is reached through the traits in [`gateway`].
//! [`sim::SimulatedWorld`] implements all of them in memory.
//!
//! ```no_run
//! use std::sync::Arc;
//! use farmhand::config::SettingsHandle;
//! use farmhand::engine::FarmEngine;
//! use farmhand::events::TracingEventSink;
//! use farmhand::exceptions::ExceptionRegistry;
//! use farmhand::gateway::Collaborators;
//! use farmhand::sim::{generate_world, WorldSpec};
//!
//! # async fn demo() -> Result<(), farmhand::engine::EngineError> {
//! let world = Arc::new(generate_world(&WorldSpec { villages: 3, targets: 50, seed: 1 }));
//! let engine = FarmEngine::new(
//!     Collaborators::from_world(world),
//!     SettingsHandle::default(),
//!     Arc::new(ExceptionRegistry::new()),
//!     Arc::new(TracingEventSink),
//! );
//! engine.start().await?;
//! engine.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod events;
pub mod exceptions;
pub mod farmer;
pub mod gateway;
pub mod logging;
pub mod scheduler;
pub mod sim;
pub mod target;
pub mod watchdog;

/// Version of the farmhand library and CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
