//! Settling in-order results as confirmed work or discarded probes.

use super::{pool::guarded, *};

/// How one in-order result counts toward the final statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
  /// A success; always counted
  ConfirmedSuccess,
  /// A failure inside the real extent of the range
  ConfirmedFailure,
  /// A failure drained after the scan had already decided to stop and lying past the last
  /// success: speculative work beyond the end of the range
  Probe,
}

/// Classifies the result at `position`.
///
/// `last_success` is the highest successful position *including* this one, and `stopped_before`
/// is whether the scan had already decided to stop before this position was drained. A result
/// is confirmed when it lies at or below the last success, or when the scan had not stopped yet
/// when it was drained; the failure that trips the threshold is therefore still confirmed, and
/// only failures drained afterwards are probes.
pub fn classify(
  position: u64,
  success: bool,
  last_success: Option<u64>,
  stopped_before: bool,
) -> Classification {
  let within_extent = last_success.is_some_and(|last| position <= last);
  if within_extent || !stopped_before {
    if success {
      Classification::ConfirmedSuccess
    } else {
      Classification::ConfirmedFailure
    }
  } else {
    Classification::Probe
  }
}

/// Applies classifications: counts them and cleans up after probes.
#[derive(Debug)]
pub struct ProbeReconciler<E> {
  /// Executor whose side effects get rolled back for probes
  executor: Arc<E>,
}

impl<E: AttemptExecutor> ProbeReconciler<E> {
  /// Creates a reconciler cleaning up through `executor`.
  pub fn new(executor: Arc<E>) -> Self { Self { executor } }

  /// Records `accounted` in `stats` and, for a probe, issues exactly one cleanup.
  ///
  /// Cleanup is best effort: whatever goes wrong inside it (including a panic) is logged and
  /// dropped here.
  pub async fn settle(&self, id: &PaperId, accounted: &Accounted, stats: &mut Stats) {
    stats.record(accounted.classification);
    match accounted.classification {
      Classification::ConfirmedSuccess => debug!(%id, "Confirmed success"),
      Classification::ConfirmedFailure => debug!(
        %id,
        reason = accounted.outcome.reason.as_deref().unwrap_or("unknown"),
        "Confirmed failure"
      ),
      Classification::Probe => {
        info!(%id, "Probe past the end of the range discarded");
        guarded(self.executor.cleanup(id), || warn!(%id, "Probe cleanup panicked")).await;
      },
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_successes_are_always_confirmed() {
    assert_eq!(classify(5, true, Some(5), false), Classification::ConfirmedSuccess);
    assert_eq!(classify(5, true, Some(5), true), Classification::ConfirmedSuccess);
  }

  #[test]
  fn test_failures_before_stop_are_confirmed() {
    assert_eq!(classify(2, false, Some(1), false), Classification::ConfirmedFailure);
    assert_eq!(classify(1, false, None, false), Classification::ConfirmedFailure);
  }

  #[test]
  fn test_failures_after_stop_past_last_success_are_probes() {
    assert_eq!(classify(6, false, Some(2), true), Classification::Probe);
    assert_eq!(classify(3, false, None, true), Classification::Probe);
  }

  #[test]
  fn test_failures_within_extent_stay_confirmed_after_stop() {
    assert_eq!(classify(4, false, Some(9), true), Classification::ConfirmedFailure);
  }
}
