//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{PlanCommand, RegistryCommand, RunCommand, ServeCommand, SetupCommand, ValidateCommand};
use std::ffi::OsString;

/// Branch-aware CI/CD pipeline runner
#[derive(Debug, Parser, Clone)]
#[command(name = "stagegate")]
#[command(version)]
#[command(about = "Branch-aware CI/CD pipeline runner", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Show the stage plan for a branch
    Plan(PlanCommand),

    /// Run a pipeline
    Run(RunCommand),

    /// Validate a pipeline configuration
    Validate(ValidateCommand),

    /// Bootstrap the CI platform on this host
    Setup(SetupCommand),

    /// Inspect images in the registry
    Registry(RegistryCommand),

    /// Serve the demo application
    Serve(ServeCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
