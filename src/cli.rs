//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::LevelFilter;

use crate::commands;
use skillsync::output::OutputConfig;

/// Skillsync - Distribute versioned skill definitions from Git sources
#[derive(Parser, Debug)]
#[command(name = "skillsync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch all enabled sources into the local cache
    Sync(commands::sync::SyncArgs),
    /// Resolve and write skill definitions into a target directory
    Deploy(commands::deploy::DeployArgs),
    /// Show the definitions each source provides and who wins each name
    List(commands::list::ListArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        let level = self
            .log_level
            .parse::<LevelFilter>()
            .unwrap_or(LevelFilter::Warn);
        env_logger::Builder::new()
            .filter_level(level)
            .format_timestamp(None)
            .init();

        let output = OutputConfig::from_env_and_flag(&self.color);

        match self.command {
            Commands::Sync(args) => commands::sync::execute(args, &output),
            Commands::Deploy(args) => commands::deploy::execute(args, &output),
            Commands::List(args) => commands::list::execute(args, &output),
        }
    }
}
