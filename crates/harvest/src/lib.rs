//! Bulk arXiv harvesting over month-partitioned identifier ranges.
//!
//! `harvest` walks a range of arXiv identifiers (for example `2304.14607` through `2305.04592`)
//! and, for each paper, runs one of three tasks:
//!
//! - **Sources**: download every version's source archive, unpack it and keep only `.tex` and
//!   `.bib` files
//! - **Metadata**: write a `metadata.json` with title, authors, dates and categories
//! - **References**: write a `references.json` built from the Semantic Scholar citation graph
//!
//! # Range scanning
//!
//! arXiv does not publish how many papers a month holds, so the scan of an open-ended month
//! floods a bounded worker pool with increasing identifiers and decides that the month is over
//! when a run of consecutive failures is observed *in identifier order*. Completions arrive in
//! any order; the [`scan`] module reassembles them, tracks the failure streak over the ordered
//! stream, discards the speculative "probe" attempts that were sent past the real end of the
//! month and cleans up whatever they left on disk.
//!
//! # Getting Started
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use harvest::{
//!   config::Config,
//!   identifier::{Month, RangeSpec},
//!   scan::RangeOrchestrator,
//!   task::MetadataTask,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!   let config = Config::default();
//!   let range = RangeSpec::new("2023-04".parse()?, 14607, "2023-05".parse()?, 4592)?;
//!
//!   let task = Arc::new(MetadataTask::new(&config)?);
//!   let report = RangeOrchestrator::new(task, config.scan_options()?).run_range(&range).await?;
//!
//!   println!("saved {} papers", report.totals.confirmed_successes);
//!   Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`identifier`]: Months, paper identifiers and validated ranges
//! - [`scan`]: Worker pool, in-order scanner, probe reconciliation and range orchestration
//! - [`task`]: The per-paper work units driven by the scanner
//! - [`arxiv`]: arXiv export API client
//! - [`semantic`]: Semantic Scholar client
//! - [`extract`]: Archive sniffing, extraction and filtering
//! - [`organize`]: Per-paper `tex/vN` folders and BibTeX entries from a folder of archives
//! - [`config`]: TOML configuration and run profiles
//! - [`error`]: Error type and `Result` alias

#![warn(missing_docs, clippy::missing_docs_in_private_items)]

use std::{
  collections::{BTreeMap, HashMap},
  fmt::Display,
  path::{Path, PathBuf},
  str::FromStr,
  sync::Arc,
  time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};
#[cfg(test)]
use {tempfile::tempdir, tracing_test::traced_test};

pub mod arxiv;
pub mod config;
pub mod error;
pub mod extract;
pub mod identifier;
pub mod organize;
pub mod scan;
pub mod semantic;
pub mod task;

use crate::{error::*, identifier::*};

/// Common traits and types for ergonomic imports.
///
/// ```no_run
/// use harvest::prelude::*;
///
/// struct AlwaysThere;
///
/// #[async_trait::async_trait]
/// impl AttemptExecutor for AlwaysThere {
///   async fn attempt(&self, _id: &PaperId) -> Outcome { Outcome::success() }
///
///   async fn cleanup(&self, _id: &PaperId) {}
/// }
/// ```
pub mod prelude {
  pub use crate::{
    error::{HarvestError, Result},
    identifier::{Month, PaperId, RangeSpec},
    scan::{AttemptExecutor, Outcome, Stats},
  };
}
