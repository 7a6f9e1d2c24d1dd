//! Settings management CLI commands.
//!
//! Provides `config get`, `config set`, `config list` and `config path` for
//! viewing and modifying farming settings from the command line.

use clap::Subcommand;

use farmhand::config::{config_file_path, ConfigFile, SettingKey};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Get a setting
    Get {
        /// Setting key in format section.key (e.g., timing.cycle_pause_secs)
        key: String,
    },

    /// Set a setting (out-of-range values are clamped)
    Set {
        /// Setting key in format section.key (e.g., commands.ceiling)
        key: String,

        /// Value to set
        value: String,
    },

    /// List every setting
    List,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Get { key } => run_get(&key),
        ConfigCommands::Set { key, value } => run_set(&key, &value),
        ConfigCommands::List => run_list(),
        ConfigCommands::Path => run_path(),
    }
}

fn parse_key(key: &str) -> Result<SettingKey, CliError> {
    key.parse().map_err(|_| {
        CliError::Config(format!("Unknown setting '{}'", key))
    })
}

fn run_get(key: &str) -> Result<(), CliError> {
    let key = parse_key(key)?;
    let config = ConfigFile::load()?;
    println!("{}", display_value(&key.get(&config.farm)));
    Ok(())
}

fn run_set(key: &str, value: &str) -> Result<(), CliError> {
    let key = parse_key(key)?;
    let mut config = ConfigFile::load()?;
    key.set(&mut config.farm, value)?;
    config.save()?;

    let stored = key.get(&config.farm);
    if stored != value.trim() {
        println!("Set {} = {} (requested {})", key.name(), display_value(&stored), value);
    } else {
        println!("Set {} = {}", key.name(), display_value(&stored));
    }
    Ok(())
}

fn run_list() -> Result<(), CliError> {
    let config = ConfigFile::load()?;

    println!("Farming Settings");
    println!("================");
    println!();

    let mut current_section = "";
    for key in SettingKey::all() {
        let section = key.section();
        if section != current_section {
            if !current_section.is_empty() {
                println!();
            }
            println!("[{}]", section);
            current_section = section;
        }
        println!("  {} = {}", key.field(), display_value(&key.get(&config.farm)));
    }

    Ok(())
}

fn run_path() -> Result<(), CliError> {
    println!("{}", config_file_path().display());
    Ok(())
}

fn display_value(value: &str) -> &str {
    if value.is_empty() {
        "(not set)"
    } else {
        value
    }
}
