//! Splitting a month range into scan phases.
//!
//! A range that stays inside one month has both ends known and is scanned exhaustively. A range
//! that crosses into the next month only knows where that second month ends, so the start month
//! is scanned adaptively from the requested identifier and the end month exhaustively from 1 up
//! to the requested identifier.

use super::*;

/// Every phase of a run plus their totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeReport {
  /// One report per phase, in the order they ran
  pub phases: Vec<PhaseReport>,
  /// Sum of every phase's counters
  pub totals: Stats,
}

impl RangeReport {
  /// Highest successful identifier seen across all phases.
  pub fn last_success(&self) -> Option<PaperId> {
    self
      .phases
      .iter()
      .rev()
      .find_map(|phase| phase.last_success.map(|number| PaperId::new(phase.month, number)))
  }

  /// Appends a phase and folds its counters into the totals.
  fn push(&mut self, phase: PhaseReport) {
    self.totals += phase.stats;
    self.phases.push(phase);
  }
}

/// Runs a [`RangeSpec`] as a series of scans sharing one executor.
#[derive(Debug)]
pub struct RangeOrchestrator<E> {
  /// Executor handed to every phase's scanner
  executor: Arc<E>,
  /// Options for every phase
  options:  ScanOptions,
}

impl<E: AttemptExecutor> RangeOrchestrator<E> {
  /// Creates an orchestrator. Options are validated when the run starts.
  pub fn new(executor: Arc<E>, options: ScanOptions) -> Self { Self { executor, options } }

  /// Scans every identifier of `range`, one phase at a time.
  ///
  /// Phases run sequentially and share nothing but the executor: each gets its own pool and its
  /// own accounting state. Invalid options fail before anything is submitted.
  pub async fn run_range(&self, range: &RangeSpec) -> Result<RangeReport> {
    let scanner = Scanner::new(Arc::clone(&self.executor), self.options)?;
    info!(%range, concurrency = self.options.concurrency, "Running range");

    let mut report = RangeReport::default();
    if range.is_single_month() {
      let phase =
        scanner.run_exhaustive(range.start_month, range.start_id, range.end_id).await?;
      report.push(phase);
      return Ok(report);
    }

    report.push(scanner.run_adaptive(range.start_month, range.start_id).await?);
    report.push(scanner.run_exhaustive(range.end_month, 1, range.end_id).await?);

    info!(
      %range,
      successes = report.totals.confirmed_successes,
      failures = report.totals.confirmed_failures,
      probes = report.totals.probes_discarded,
      "Range finished"
    );
    Ok(report)
  }
}
