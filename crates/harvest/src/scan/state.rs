//! The reorder buffer and the streak state it feeds.
//!
//! [`ScanState`] is plain data with no concurrency of its own: the scanner's coordinating task
//! owns it exclusively and is the only thing that mutates it. That makes the accounting a pure
//! function from a stream of `(position, outcome)` completions to a stream of [`Accounted`]
//! results, which the tests below exercise without any runtime at all.

use super::*;

/// One result released from the reorder buffer, in position order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accounted {
  /// Scan position (the identifier's sequence number)
  pub position:       u64,
  /// What the attempt reported
  pub outcome:        Outcome,
  /// How the result counts
  pub classification: Classification,
  /// Whether this result is the one that tripped the failure threshold
  pub triggered_stop: bool,
}

/// In-order accounting state for one scan phase.
#[derive(Debug, Clone)]
pub struct ScanState {
  /// Next position expected by the in-order accounting
  next_to_process:      u64,
  /// In-order failures immediately preceding `next_to_process`
  consecutive_failures: u32,
  /// Highest in-order position that succeeded
  last_success:         Option<u64>,
  /// Set once the threshold is reached; never cleared
  should_stop:          bool,
  /// Position whose failure set `should_stop`
  stop_position:        Option<u64>,
  /// Consecutive failures that end the scan
  threshold:            u32,
  /// Completed but not yet accounted outcomes, keyed by position
  buffer:               BTreeMap<u64, Outcome>,
}

impl ScanState {
  /// Fresh state for a scan whose first position is `start`.
  pub fn new(start: u64, threshold: u32) -> Self {
    Self {
      next_to_process: start,
      consecutive_failures: 0,
      last_success: None,
      should_stop: false,
      stop_position: None,
      threshold,
      buffer: BTreeMap::new(),
    }
  }

  /// Parks a completion until every lower position has been accounted for.
  ///
  /// Positions below `next_to_process` were already accounted, and a position is only ever
  /// submitted once; a completion violating either is dropped with an error log.
  pub fn insert(&mut self, position: u64, outcome: Outcome) {
    if position < self.next_to_process || self.buffer.contains_key(&position) {
      error!(position, next = self.next_to_process, "Duplicate completion ignored");
      return;
    }
    self.buffer.insert(position, outcome);
  }

  /// Releases the contiguous run of buffered results starting at `next_to_process`.
  pub fn drain(&mut self) -> Vec<Accounted> {
    let mut released = Vec::new();
    while let Some(outcome) = self.buffer.remove(&self.next_to_process) {
      let position = self.next_to_process;
      released.push(self.account(position, outcome));
      self.next_to_process += 1;
    }
    released
  }

  /// Applies one in-order result to the streak state and classifies it.
  fn account(&mut self, position: u64, outcome: Outcome) -> Accounted {
    let stopped_before = self.should_stop;
    let mut triggered_stop = false;

    if outcome.success {
      self.consecutive_failures = 0;
      self.last_success = Some(position);
    } else {
      self.consecutive_failures += 1;
      if !self.should_stop && self.consecutive_failures >= self.threshold {
        self.should_stop = true;
        self.stop_position = Some(position);
        triggered_stop = true;
      }
    }

    let classification = classify(position, outcome.success, self.last_success, stopped_before);
    Accounted { position, outcome, classification, triggered_stop }
  }

  /// Next position the accounting is waiting for.
  pub fn next_to_process(&self) -> u64 { self.next_to_process }

  /// Length of the current in-order failure streak.
  pub fn consecutive_failures(&self) -> u32 { self.consecutive_failures }

  /// Highest in-order successful position so far.
  pub fn last_success(&self) -> Option<u64> { self.last_success }

  /// Whether the scan has decided to stop submitting.
  pub fn should_stop(&self) -> bool { self.should_stop }

  /// Position at which the failure threshold was reached.
  pub fn stop_position(&self) -> Option<u64> { self.stop_position }

  /// Completions waiting on a lower position.
  pub fn buffered(&self) -> usize { self.buffer.len() }
}
