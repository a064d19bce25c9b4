//! Concurrent range scanning with in-order accounting.
//!
//! The pieces, from the leaves up:
//!
//! - [`AttemptExecutor`]: one unit of work for one [`PaperId`], returning an [`Outcome`]
//! - [`WorkerPool`]: runs attempts with a fixed maximum concurrency
//! - [`Scanner`]: keeps the pool saturated, reassembles completions in identifier order and
//!   decides when an open-ended month has run out of papers
//! - [`ProbeReconciler`]: settles each in-order result as confirmed or as a discarded probe and
//!   cleans up after probes
//! - [`RangeOrchestrator`]: splits a [`RangeSpec`] into phases and totals their statistics
//!
//! # Why in-order accounting
//!
//! Attempts finish in whatever order the network allows. A burst of failures in completion order
//! says nothing about the end of a month, since `2305.04600` may legitimately finish (and succeed)
//! after `2305.04601..=04603` have failed transiently. The scanner therefore parks every
//! completion in a reorder buffer keyed by its sequence number and only counts the consecutive
//! failure streak over the contiguous, ordered prefix.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use harvest::{prelude::*, scan::{ScanOptions, Scanner}};
//!
//! struct Even;
//!
//! #[async_trait::async_trait]
//! impl AttemptExecutor for Even {
//!   async fn attempt(&self, id: &PaperId) -> Outcome {
//!     if id.number % 2 == 0 { Outcome::success() } else { Outcome::failure("odd") }
//!   }
//!
//!   async fn cleanup(&self, _id: &PaperId) {}
//! }
//!
//! # async fn example() -> Result<()> {
//! let scanner = Scanner::new(Arc::new(Even), ScanOptions::default())?;
//! let report = scanner.run_exhaustive("2023-05".parse()?, 1, 100).await?;
//! assert_eq!(report.stats.confirmed_successes, 50);
//! # Ok(())
//! # }
//! ```

use super::*;

mod orchestrator;
mod pool;
mod reconcile;
mod scanner;
mod state;

pub use orchestrator::{RangeOrchestrator, RangeReport};
pub use pool::WorkerPool;
pub use reconcile::{classify, Classification, ProbeReconciler};
pub use scanner::{PhaseReport, ScanMode, Scanner};
pub use state::{Accounted, ScanState};

/// Default number of attempts kept in flight.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Default number of in-order consecutive failures that ends an open-ended scan.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Result of one attempt.
///
/// Failure is an ordinary value here. Whatever went wrong inside the attempt (network errors,
/// missing papers, broken archives) has already been folded into `reason`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
  /// Whether the attempt produced its artifact
  pub success: bool,
  /// Short description of why the attempt failed
  pub reason:  Option<String>,
}

impl Outcome {
  /// A successful outcome.
  pub fn success() -> Self { Self { success: true, reason: None } }

  /// A failed outcome with a reason.
  pub fn failure(reason: impl Into<String>) -> Self {
    Self { success: false, reason: Some(reason.into()) }
  }
}

impl<T> From<Result<T>> for Outcome {
  fn from(result: Result<T>) -> Self {
    match result {
      Ok(_) => Self::success(),
      Err(e) => Self::failure(e.to_string()),
    }
  }
}

/// The unit of work the scanner drives.
///
/// Implementations are shared between all workers of a pool and must be callable concurrently.
/// Distinct identifiers must map to distinct on-disk locations; [`PaperId::folder_name`] exists
/// for exactly that.
#[async_trait]
pub trait AttemptExecutor: Send + Sync + 'static {
  /// Processes one identifier. Never fails with an error; failures are reported in the outcome.
  async fn attempt(&self, id: &PaperId) -> Outcome;

  /// Removes whatever [`attempt`](Self::attempt) may have left on disk for `id`.
  ///
  /// Called for discarded probes. Must be idempotent and must swallow its own errors.
  async fn cleanup(&self, id: &PaperId);
}

/// Counters exposed at the end of a phase or run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
  /// Attempts that succeeded and count toward the results
  pub confirmed_successes: u64,
  /// Attempts that failed inside the real extent of the range
  pub confirmed_failures:  u64,
  /// Speculative attempts past the end of the range whose results were discarded
  pub probes_discarded:    u64,
}

impl Stats {
  /// Every attempt accounted for, confirmed or not.
  pub fn total(&self) -> u64 {
    self.confirmed_successes + self.confirmed_failures + self.probes_discarded
  }

  /// Bumps the counter matching `classification`.
  pub fn record(&mut self, classification: Classification) {
    match classification {
      Classification::ConfirmedSuccess => self.confirmed_successes += 1,
      Classification::ConfirmedFailure => self.confirmed_failures += 1,
      Classification::Probe => self.probes_discarded += 1,
    }
  }
}

impl std::ops::AddAssign for Stats {
  fn add_assign(&mut self, rhs: Self) {
    self.confirmed_successes += rhs.confirmed_successes;
    self.confirmed_failures += rhs.confirmed_failures;
    self.probes_discarded += rhs.probes_discarded;
  }
}

/// Tuning shared by every phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
  /// Maximum number of attempts in flight
  pub concurrency:       usize,
  /// In-order consecutive failures that end an open-ended scan
  pub failure_threshold: u32,
}

impl ScanOptions {
  /// Checks that both knobs are non-zero.
  pub fn validate(&self) -> Result<()> {
    if self.concurrency == 0 {
      return Err(HarvestError::Config("concurrency must be at least 1".into()));
    }
    if self.failure_threshold == 0 {
      return Err(HarvestError::Config("failure threshold must be at least 1".into()));
    }
    Ok(())
  }
}

impl Default for ScanOptions {
  fn default() -> Self {
    Self { concurrency: DEFAULT_CONCURRENCY, failure_threshold: DEFAULT_FAILURE_THRESHOLD }
  }
}
