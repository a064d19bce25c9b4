//! The sliding-window scanner.
//!
//! A [`Scanner`] drives one month at a time. It keeps its [`WorkerPool`] topped up with
//! increasing identifiers, feeds every completion through a [`ScanState`] and settles whatever
//! comes out of the reorder buffer with a [`ProbeReconciler`]. The coordinating loop is the only
//! owner of the state, so nothing here is shared or locked.

use super::{pool::guarded, *};

/// How a phase decides where it ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
  /// Fixed bounds; every identifier is attempted and every result counts
  Exhaustive,
  /// Open-ended; the scan stops after a run of in-order failures
  Adaptive,
}

impl Display for ScanMode {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Exhaustive => write!(f, "exhaustive"),
      Self::Adaptive => write!(f, "adaptive"),
    }
  }
}

/// What one phase did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseReport {
  /// Month the phase scanned
  pub month:          Month,
  /// How the phase was bounded
  pub mode:           ScanMode,
  /// First sequence number submitted
  pub first_id:       u64,
  /// Highest sequence number submitted, probes included
  pub last_submitted: Option<u64>,
  /// Highest sequence number whose attempt succeeded
  pub last_success:   Option<u64>,
  /// Position whose failure ended an adaptive phase
  pub stopped_at:     Option<u64>,
  /// Counters for this phase alone
  pub stats:          Stats,
}

/// Bounded concurrent scanner over the identifiers of one month.
#[derive(Debug)]
pub struct Scanner<E> {
  /// Shared unit of work
  executor:   Arc<E>,
  /// Settles in-order results through the same executor
  reconciler: ProbeReconciler<E>,
  /// Pool width and failure threshold
  options:    ScanOptions,
}

impl<E: AttemptExecutor> Scanner<E> {
  /// Creates a scanner, rejecting a zero pool width or a zero threshold.
  pub fn new(executor: Arc<E>, options: ScanOptions) -> Result<Self> {
    options.validate()?;
    let reconciler = ProbeReconciler::new(Arc::clone(&executor));
    Ok(Self { executor, reconciler, options })
  }

  /// Options this scanner was built with.
  pub fn options(&self) -> ScanOptions { self.options }

  /// Attempts every identifier in `first..=last` of `month` and counts every result.
  ///
  /// There is no early stop and therefore no probe: failures inside fixed bounds are always
  /// confirmed.
  pub async fn run_exhaustive(&self, month: Month, first: u64, last: u64) -> Result<PhaseReport> {
    if first == 0 || first > last {
      return Err(HarvestError::InvalidRange(format!(
        "cannot scan {month} from {first} to {last}"
      )));
    }
    if last > month.max_sequence() {
      return Err(HarvestError::InvalidRange(format!(
        "{last} is past the largest identifier of {month}"
      )));
    }
    self.drive(month, ScanMode::Exhaustive, first, last, u32::MAX).await
  }

  /// Scans `month` upward from `start` until the failure threshold is reached in identifier
  /// order, or the month's identifier space runs out.
  pub async fn run_adaptive(&self, month: Month, start: u64) -> Result<PhaseReport> {
    if start == 0 || start > month.max_sequence() {
      return Err(HarvestError::InvalidRange(format!(
        "{start} is not a sequence number in {month}"
      )));
    }
    self
      .drive(month, ScanMode::Adaptive, start, month.max_sequence(), self.options.failure_threshold)
      .await
  }

  /// The coordinating loop shared by both modes.
  async fn drive(
    &self,
    month: Month,
    mode: ScanMode,
    first: u64,
    ceiling: u64,
    threshold: u32,
  ) -> Result<PhaseReport> {
    info!(phase = %mode, %month, first, "Starting scan");

    let mut pool = WorkerPool::new(self.options.concurrency)?;
    let mut state = ScanState::new(first, threshold);
    let mut stats = Stats::default();
    let mut current = first;
    let mut last_submitted = None;

    let window = self.options.concurrency as u64;
    loop {
      // Results parked in the reorder buffer keep their slot in the window.
      while !state.should_stop()
        && current <= ceiling
        && current < state.next_to_process() + window
        && pool.has_capacity()
      {
        self.submit(&mut pool, PaperId::new(month, current));
        last_submitted = Some(current);
        current += 1;
      }

      let Some(joined) = pool.next_completed().await else { break };
      let (position, outcome) = match joined {
        Ok(done) => done,
        Err(e) => {
          pool.abandon();
          return Err(HarvestError::WorkerLost(e.to_string()));
        },
      };
      trace!(phase = %mode, position, success = outcome.success, "Attempt completed");

      state.insert(position, outcome);
      for accounted in state.drain() {
        if accounted.triggered_stop {
          info!(
            phase = %mode,
            %month,
            position = accounted.position,
            in_flight = pool.in_flight(),
            "Failure threshold reached, no further submissions"
          );
        }
        let id = PaperId::new(month, accounted.position);
        self.reconciler.settle(&id, &accounted, &mut stats).await;
      }
    }

    if state.buffered() > 0 {
      error!(phase = %mode, buffered = state.buffered(), "Results left unaccounted");
    }

    let report = PhaseReport {
      month,
      mode,
      first_id: first,
      last_submitted,
      last_success: state.last_success(),
      stopped_at: state.stop_position(),
      stats,
    };
    info!(
      phase = %mode,
      %month,
      last_success = ?report.last_success,
      successes = stats.confirmed_successes,
      failures = stats.confirmed_failures,
      probes = stats.probes_discarded,
      "Scan finished"
    );
    Ok(report)
  }

  /// Hands one attempt to the pool; a panic inside it comes back as a failed outcome.
  fn submit(&self, pool: &mut WorkerPool<(u64, Outcome)>, id: PaperId) {
    let executor = Arc::clone(&self.executor);
    pool.submit(async move {
      let outcome = guarded(executor.attempt(&id), || {
        error!(%id, "Attempt panicked");
        Outcome::failure("attempt panicked")
      })
      .await;
      (id.number, outcome)
    });
  }
}
