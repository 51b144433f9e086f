//! Drip CLI
//!
//! Command-line interface for replaying and quoting drip ledger scenarios.

mod scenario;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use drip_core::{LedgerConfig, LoggingConfig};
use scenario::{Scenario, Simulation};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "drip")]
#[command(author = "Drip Ledger Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Drip ledger - per-second metering and settlement", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scenario and print the resulting ledger state
    Simulate {
        /// Scenario file
        #[arg(short, long)]
        scenario: PathBuf,

        /// Configuration file path
        #[arg(short, long, default_value = "drip.toml")]
        config: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Quote the drip rate of each scenario account's initial apps
    Estimate {
        /// Scenario file
        #[arg(short, long)]
        scenario: PathBuf,

        /// Configuration file path
        #[arg(short, long, default_value = "drip.toml")]
        config: PathBuf,

        /// Print the quotes as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Configuration file path
        #[arg(short, long, default_value = "drip.toml")]
        config: PathBuf,

        /// Ignore the file and environment, print built-in defaults
        #[arg(long)]
        defaults: bool,
    },
}

impl Commands {
    fn config_path(&self) -> &Path {
        match self {
            Self::Simulate { config, .. } | Self::Estimate { config, .. } | Self::Config { config, .. } => config,
        }
    }
}

fn init_logging(verbose: bool, logging: &LoggingConfig) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(env_filter);

    if logging.format == "json" {
        registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.command.config_path().to_path_buf();
    let config = LedgerConfig::load(&config_path)
        .with_context(|| format!("failed to load configuration {:?}", config_path))?;
    init_logging(cli.verbose, &config.logging);

    match cli.command {
        Commands::Simulate { scenario, json, .. } => {
            let scenario = Scenario::load(&scenario)?;
            tracing::info!(
                "Replaying scenario '{}': {} accounts, {} steps",
                scenario.name,
                scenario.accounts.len(),
                scenario.steps.len()
            );

            let mut sim = Simulation::new(&scenario, config)?;
            sim.open_accounts(&scenario)?;
            let outcomes = sim.run(&scenario.steps);
            let report = sim.report(&scenario, outcomes)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report);
            }
            tracing::debug!(
                "{} accounts, {} failed steps",
                sim.ledger().accounts().count(),
                report.failed_steps()
            );
            if report.vault_held != report.liabilities {
                tracing::error!(
                    "Vault holds {} but the ledger owes {}",
                    report.vault_held,
                    report.liabilities
                );
            }
        }

        Commands::Estimate { scenario, json, .. } => {
            let scenario = Scenario::load(&scenario)?;
            let mut sim = Simulation::new(&scenario, config)?;
            let estimates = sim.estimates(&scenario)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&estimates)?);
            } else {
                for entry in &estimates {
                    let quote = &entry.estimate.quote;
                    println!(
                        "{}  apps {}  compute {}/s  drip rate {}/s  required funding {}",
                        entry.account,
                        entry.apps,
                        quote.compute_cost_per_sec,
                        quote.drip_rate,
                        entry.estimate.required_funding
                    );
                    for (subnet, cost) in &quote.subnet_costs {
                        println!("    {} {}/s", subnet, cost);
                    }
                }
            }
        }

        Commands::Config { defaults, .. } => {
            let shown = if defaults { LedgerConfig::default() } else { config };
            print!("{}", shown.to_toml_string()?);
        }
    }

    Ok(())
}
