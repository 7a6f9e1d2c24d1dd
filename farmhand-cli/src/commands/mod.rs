//! CLI command implementations.
//!
//! - [`config`] - Settings management (get, set, list, path)
//! - [`run`] - Run the engine against a simulated world

pub mod config;
pub mod run;
