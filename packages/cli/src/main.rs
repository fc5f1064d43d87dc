#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the ULI map pipeline.
//!
//! Uses `indicatif-log-bridge` (via [`uli_map_cli_utils::init_logger`]) to
//! route `log` output through `indicatif::MultiProgress` so that log lines
//! and progress bars never fight for the terminal.

mod config;
mod stages;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use uli_map_risk_models::ScoringMode;

use crate::config::Config;

#[derive(Parser)]
#[command(name = "uli_map", about = "Update Lag Index scoring and service van planning")]
struct Cli {
    /// Config file (falls back to `ULI_MAP_CONFIG`, then the built-in default)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    /// One row per postal code
    Aggregate,
    /// One row per individual
    Record,
}

impl From<ModeArg> for ScoringMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Aggregate => Self::Aggregate,
            ModeArg::Record => Self::Record,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ProfileArg {
    /// Demand-weighted vans sized by outstanding updates
    Weighted,
    /// Vans sized by the number of at-risk individuals
    Count,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate raw extracts into the postal-code table and monthly series
    Ingest,
    /// Join an enrolment extract with an update extract per individual
    MergeRecords {
        /// Enrolment CSV (id, date of birth, postal code)
        #[arg(long)]
        enrolments: PathBuf,
        /// Update CSV (id, update date)
        #[arg(long)]
        updates: PathBuf,
    },
    /// Compute the Update Lag Index and geocode each postal code
    Score {
        #[arg(long, value_enum, default_value = "aggregate")]
        mode: ModeArg,
    },
    /// Place service vans over the scored risk table
    Optimize {
        /// Defaults to `weighted` for aggregate tables, `count` for record tables
        #[arg(long, value_enum)]
        profile: Option<ProfileArg>,
    },
    /// Ingest, score (aggregate), and optimize in one go
    Run,
    /// List discovered source files
    Sources,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = uli_map_cli_utils::init_logger();
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Ingest => {
            let summary = stages::ingest(&config, &multi)?;
            println!(
                "{} files read, {} skipped, {} rows; {} enrolments, {} updates",
                summary.files_read,
                summary.files_skipped,
                summary.rows_read,
                summary.enrolment_total,
                summary.update_total
            );
        }
        Commands::MergeRecords {
            enrolments,
            updates,
        } => stages::merge_records(&config, &enrolments, &updates)?,
        Commands::Score { mode } => {
            let stats = stages::score(&config, mode.into()).await?;
            println!(
                "{} rows scored, {} emitted: {} CRITICAL, {} WARNING, {} SAFE",
                stats.scored_rows, stats.output_rows, stats.critical, stats.warning, stats.safe
            );
        }
        Commands::Optimize { profile } => {
            let profile = profile.map(|p| match p {
                ProfileArg::Weighted => &config.optimizer.weighted,
                ProfileArg::Count => &config.optimizer.count,
            });
            stages::optimize(&config, profile)?;
        }
        Commands::Run => stages::run(&config, &multi).await?,
        Commands::Sources => stages::list_sources(&config),
    }

    Ok(())
}
