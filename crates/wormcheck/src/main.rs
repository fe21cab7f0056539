//! wormcheck: S3 Object Lock (WORM) conformance suite.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use wormcheck::scenario::{catalogue, select};
use wormcheck::Driver;
use wormcheck_core::config::{Config, LogFormat};
use wormcheck_storage::S3Store;

mod cli;

use cli::{Cli, Commands, ListArgs, OutputFormat, RunArgs};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::List(args) => list(&args),
        Commands::Version => {
            println!("wormcheck {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run(args: RunArgs) -> Result<ExitCode> {
    let mut config = load_config(args.config.as_deref())?;
    config.apply_env();
    if let Some(endpoint) = args.endpoint {
        config.endpoint.url = endpoint;
    }
    if args.strict_error_codes {
        config.run.strict_error_codes = true;
    }
    if let Some(format) = args.log_format {
        config.logging.format = match format {
            OutputFormat::Text => LogFormat::Pretty,
            OutputFormat::Json => LogFormat::Json,
        };
    }
    config.validate().context("Invalid configuration")?;

    init_logging(&config)?;

    let scenarios = select(&args.scenarios)
        .context("Invalid --scenario selection (see `wormcheck list`)")?;
    info!(
        endpoint = %config.endpoint.url,
        region = %config.endpoint.region,
        scenarios = scenarios.len(),
        "Starting conformance run"
    );

    let driver = Driver::new(S3Store::new(&config.endpoint), &config);
    let mut failed = 0;
    for scenario in &scenarios {
        let report = driver.run(scenario).await;
        println!("{}", report.to_json().context("Failed to serialize report")?);
        if report.is_failure() {
            failed += 1;
        }
    }

    info!(total = scenarios.len(), failed, "Conformance run finished");
    Ok(if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn list(args: &ListArgs) -> Result<ExitCode> {
    for scenario in catalogue() {
        match args.format {
            OutputFormat::Text => println!("{:<40} {}", scenario.name, scenario.description),
            OutputFormat::Json => println!(
                "{}",
                serde_json::json!({
                    "name": scenario.name,
                    "function": scenario.function,
                    "description": scenario.description,
                    "multipart": scenario.uses_multipart(),
                })
            ),
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn init_logging(config: &Config) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry().with(filter).with(fmt_layer.json()).try_init()?;
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry().with(filter).with(fmt_layer).try_init()?;
        }
    }

    Ok(())
}
