//! farmhand CLI - run the farming engine and manage its settings.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::run::RunArgs;

#[derive(Parser)]
#[command(name = "farmhand")]
#[command(version = farmhand::VERSION)]
#[command(about = "Multi-village farming scheduler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine against a generated simulated world
    Run {
        /// Config file to read instead of ~/.farmhand/config.ini
        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of owned villages in the generated world
        #[arg(long, default_value = "3")]
        villages: usize,

        /// Number of targets in the generated world
        #[arg(long, default_value = "60")]
        targets: usize,

        /// Seed for the generated world
        #[arg(long, default_value = "1")]
        seed: u64,

        /// How long to run, in seconds
        #[arg(long, default_value = "60")]
        duration: u64,

        /// Enable debug logging regardless of RUST_LOG
        #[arg(long)]
        debug: bool,

        /// Print the final report as JSON
        #[arg(long)]
        json: bool,
    },

    /// View and modify settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            config,
            villages,
            targets,
            seed,
            duration,
            debug,
            json,
        } => commands::run::run(RunArgs {
            config,
            villages,
            targets,
            seed,
            duration,
            debug,
            json,
        }),
        Commands::Config { command } => commands::config::run(command),
    };

    if let Err(e) = result {
        e.exit();
    }
}
