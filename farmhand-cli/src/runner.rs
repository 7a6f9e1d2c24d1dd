//! CLI runner for common setup.
//!
//! Loads the config file and initializes logging so command handlers only
//! deal with their own work.

use std::path::Path;

use tracing::info;

use farmhand::config::ConfigFile;
use farmhand::logging::{init_logging, split_log_path, LoggingGuard};

use crate::error::CliError;

/// Runner that manages CLI lifecycle.
pub struct CliRunner {
    /// Keeps logging active while the runner exists
    _logging_guard: LoggingGuard,
    config: ConfigFile,
}

impl CliRunner {
    /// Loads config from `path` (or the default location) and initializes
    /// logging.
    ///
    /// `stdout` mirrors the log to stdout; turn it off when stdout carries
    /// machine-readable output.
    pub fn new(path: Option<&Path>, debug: bool, stdout: bool) -> Result<Self, CliError> {
        let config = match path {
            Some(path) => ConfigFile::load_from(path)?,
            None => ConfigFile::load()?,
        };

        let (log_dir, log_file) = split_log_path(&config.logging.file);
        let logging_guard = init_logging(log_dir, log_file, stdout, debug || config.logging.debug)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            _logging_guard: logging_guard,
            config,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("farmhand v{}", farmhand::VERSION);
        info!(log = %self.config.logging.file.display(), "farmhand CLI: {} command", command);
    }
}
