//! Command line front end for the `harvest` library.
//!
//! Runs the sources, metadata and references passes over a range of arXiv identifiers, either
//! given on the command line or taken from a named profile in the configuration file.
//!
//! # Usage
//!
//! ```bash
//! # Write a configuration file with example profiles
//! harvest init
//!
//! # Download and unpack every source between two papers
//! harvest sources --start-month 2023-04 --start-id 14607 --end-month 2023-05 --end-id 4592
//!
//! # Run all three passes over a profile from the config file
//! harvest all --profile april-tail
//!
//! # Unpack a folder of previously downloaded archives
//! harvest extract ./downloads ./sources
//!
//! # Regroup downloaded archives into tex/vN folders with a references.bib each
//! harvest organize ./downloads ./organized
//! ```
//!
//! Logging goes to stderr and gets louder with every `-v`; `RUST_LOG` overrides it.

#![warn(missing_docs, clippy::missing_docs_in_private_items)]

use std::{path::PathBuf, sync::Arc};

use clap::{builder::ArgAction, Args, Parser, Subcommand};
use console::style;
use harvest::{
  config::Config,
  identifier::{Month, RangeSpec},
  scan::{AttemptExecutor, RangeOrchestrator, RangeReport, ScanOptions},
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

pub mod commands;
pub mod error;

use crate::{commands::*, error::*};

/// Prefix for information messages
static INFO_PREFIX: &str = "ℹ ";
/// Prefix for success messages
static SUCCESS_PREFIX: &str = "✓ ";
/// Prefix for warning messages
static WARNING_PREFIX: &str = "⚠️ ";
/// Prefix for error messages
static ERROR_PREFIX: &str = "✗ ";
/// Continuation line for tree structure
static TREE_BRANCH: &str = "├";
/// Leaf character for tree structure (end of branch)
static TREE_LEAF: &str = "└";

/// Command line interface configuration and argument parsing
#[derive(Parser)]
#[command(author, version, about = "Bulk arXiv source, metadata and citation harvester")]
pub struct Cli {
  /// Verbose mode (-v, -vv, -vvv) for different levels of logging detail
  #[arg(short, long, action = ArgAction::Count, global = true, help = "Increase logging verbosity")]
  verbose: u8,

  /// Configuration file. Defaults to the platform config directory; a missing default file means
  /// built-in defaults.
  #[arg(long, short, global = true)]
  config: Option<PathBuf>,

  /// The subcommand to execute
  #[command(subcommand)]
  command: Commands,
}

/// Range selection and overrides shared by every pass.
#[derive(Args, Clone, Debug, Default)]
pub struct RangeArgs {
  /// Named profile from the configuration file
  #[arg(long, short)]
  pub profile: Option<String>,

  /// First month of the range (YYYY-MM)
  #[arg(long)]
  pub start_month: Option<String>,

  /// First sequence number in the start month
  #[arg(long)]
  pub start_id: Option<u64>,

  /// Last month of the range (YYYY-MM)
  #[arg(long)]
  pub end_month: Option<String>,

  /// Last sequence number in the end month
  #[arg(long)]
  pub end_id: Option<u64>,

  /// Where paper folders are written
  #[arg(long)]
  pub save_dir: Option<PathBuf>,

  /// Attempts kept in flight
  #[arg(long)]
  pub parallel: Option<usize>,

  /// Consecutive failures that end an open-ended month
  #[arg(long)]
  pub threshold: Option<u32>,
}

/// Configures the logging system based on the verbosity level
///
/// The verbosity levels are:
/// - 0: error (default)
/// - 1: warn
/// - 2: info
/// - 3: debug
/// - 4+: trace
fn setup_logging(verbosity: u8) {
  let filter = match verbosity {
    0 => "error",
    1 => "warn",
    2 => "info",
    3 => "debug",
    _ => "trace",
  };

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .with_file(true)
    .with_line_number(true)
    .with_thread_ids(true)
    .with_target(true)
    .init();
}

/// Loads the configuration the user pointed at, or the default one.
///
/// An explicit `--config` must exist. The default path is optional.
fn load_config(path: Option<&PathBuf>) -> Result<Config> {
  match path {
    Some(path) => Ok(Config::load(path)?),
    None => {
      let path = Config::default_path();
      if path.exists() {
        Ok(Config::load(&path)?)
      } else {
        debug!("No config at {}, using defaults", path.display());
        Ok(Config::default())
      }
    },
  }
}

/// Entry point for the harvest CLI application
///
/// # Errors
///
/// Only configuration problems (bad ranges, unknown profiles, unreadable config files) and
/// filesystem errors end the program with an error; failed papers are reported in the summaries.
#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  setup_logging(cli.verbose);

  let result = match &cli.command {
    Commands::Init(options) => init(cli.config.as_ref(), options).await,
    Commands::Extract(options) => extract(options).await,
    Commands::Organize(options) => organize(cli.config.as_ref(), options).await,
    Commands::Sources(range) => run(&cli, range, Pass::Sources).await,
    Commands::Metadata(range) => run(&cli, range, Pass::Metadata).await,
    Commands::References(range) => run(&cli, range, Pass::References).await,
    Commands::All(range) => run_all(&cli, range).await,
  };

  if let Err(e) = &result {
    eprintln!("{} {e}", style(ERROR_PREFIX).red());
  }
  result
}
