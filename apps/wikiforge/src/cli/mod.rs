//! # wikiforge CLI Module
//!
//! ## Available Commands
//!
//! - `run` - Run the pipeline for one snapshot
//! - `stages` - List the registered stages
//! - `status` - Show which stage outputs are already present

mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use wikiforge_core::ForgeError;
use wikiforge_core::config::{CapSetting, ConfigOverrides};

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// wikiforge - Wikipedia + Wikidata corpus builder
///
/// Turns one Wikipedia dump and one Wikidata dump into a chain of derived,
/// resumable corpus artifacts.
#[derive(Parser, Debug)]
#[command(name = "wikiforge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress the human-readable summary
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run every stage for a snapshot
    Run {
        #[command(flatten)]
        snapshot: SnapshotArgs,

        #[command(flatten)]
        tuning: RunArgs,
    },

    /// List the registered stages in execution order
    Stages,

    /// Show which stage outputs are present for a snapshot
    Status {
        #[command(flatten)]
        snapshot: SnapshotArgs,
    },
}

/// Arguments that identify a snapshot and where its artifacts live.
#[derive(Args, Debug, Clone, Default)]
pub struct SnapshotArgs {
    /// Wikipedia dump date (YYYYMMDD)
    pub wp_date: String,

    /// Wikidata dump date (YYYYMMDD)
    pub wd_date: String,

    /// Root directory for raw and derived artifacts
    #[arg(long)]
    pub data_path: Option<PathBuf>,

    /// Wiki id, e.g. enwiki
    #[arg(long)]
    pub wiki: Option<String>,

    /// TOML file with configuration overrides
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Flags that tune a run.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Dump mirror: a local directory or file:// URL
    #[arg(long)]
    pub mirror_url: Option<String>,

    /// Comma-separated download jobs
    #[arg(long)]
    pub jobs: Option<String>,

    /// Entity cap per chunked stage: a positive count, or 0/none/unlimited
    #[arg(long)]
    pub max_entities: Option<String>,

    /// Worker threads for chunked stages
    #[arg(long)]
    pub workers: Option<i64>,

    /// Also write the item-statements table
    #[arg(long)]
    pub include_item_statements: bool,

    /// Reuse stages whose outputs already exist
    #[arg(long)]
    pub skip_completed: bool,

    /// Malformed records tolerated per chunk, in parts per million
    #[arg(long)]
    pub skip_tolerance_ppm: Option<i64>,
}

impl SnapshotArgs {
    /// The command-line configuration layer.
    #[must_use]
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            wikipedia_date: Some(self.wp_date.clone()),
            wikidata_date: Some(self.wd_date.clone()),
            wiki: self.wiki.clone(),
            data_path: self.data_path.clone(),
            ..ConfigOverrides::default()
        }
    }
}

impl RunArgs {
    /// The command-line tuning layer. Unset flags leave lower layers alone.
    #[must_use]
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            mirror_url: self.mirror_url.clone(),
            jobs: self.jobs.clone(),
            max_entities: self.max_entities.clone().map(CapSetting::Word),
            workers: self.workers,
            include_item_statements: self.include_item_statements.then_some(true),
            skip_completed: self.skip_completed.then_some(true),
            skip_tolerance_ppm: self.skip_tolerance_ppm,
            ..ConfigOverrides::default()
        }
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), ForgeError> {
    let output = Output {
        json: cli.json_mode,
        quiet: cli.quiet,
    };
    match cli.command {
        Commands::Run { snapshot, tuning } => {
            let flags = snapshot.overrides().layered(tuning.overrides());
            let config = effective_config(snapshot.config.as_deref(), env_overrides()?, flags)?;
            cmd_run(config, output)
        }
        Commands::Stages => cmd_stages(output),
        Commands::Status { snapshot } => {
            let config = effective_config(snapshot.config.as_deref(), env_overrides()?, snapshot.overrides())?;
            cmd_status(config, output)
        }
    }
}
