//! Command line interface definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// wormcheck: S3 Object Lock (WORM) conformance suite.
#[derive(Parser)]
#[command(name = "wormcheck")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run scenarios against an endpoint.
    Run(RunArgs),
    /// List the built-in scenarios.
    List(ListArgs),
    /// Print version information.
    Version,
}

/// Arguments for the run command.
#[derive(Args)]
pub struct RunArgs {
    /// Path to configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Endpoint URL, overriding the configuration file and SERVER_ENDPOINT.
    #[arg(short, long)]
    pub endpoint: Option<String>,

    /// Scenario to run; repeat to run several. Runs all when omitted.
    #[arg(short, long = "scenario", value_name = "NAME")]
    pub scenarios: Vec<String>,

    /// Require the server's error codes to match each denial reason.
    #[arg(long)]
    pub strict_error_codes: bool,

    /// Log output format, overriding the configuration file.
    #[arg(long)]
    pub log_format: Option<OutputFormat>,
}

/// Arguments for the list command.
#[derive(Args)]
pub struct ListArgs {
    /// Output format (text, json).
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Output format for CLI commands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}
