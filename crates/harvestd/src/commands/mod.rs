use super::*;

pub mod extract;
pub mod init;
pub mod organize;
pub mod run;

pub use extract::{extract, ExtractOptions};
pub use init::{init, InitOptions};
pub use organize::{organize, OrganizeOptions};
pub use run::{run, run_all, Pass};

/// Available commands for the CLI
#[derive(Subcommand, Clone)]
pub enum Commands {
  /// Write a configuration file with defaults and example profiles
  Init(InitOptions),

  /// Download and unpack the LaTeX sources of every version of every paper in a range
  Sources(RangeArgs),

  /// Write metadata.json for every paper in a range
  Metadata(RangeArgs),

  /// Write references.json for every paper in a range
  References(RangeArgs),

  /// Run the sources, metadata and references passes side by side
  All(RangeArgs),

  /// Unpack and filter a folder of already downloaded archives
  Extract(ExtractOptions),

  /// Group downloaded archives into per-paper tex/vN folders with a references.bib
  Organize(OrganizeOptions),
}
