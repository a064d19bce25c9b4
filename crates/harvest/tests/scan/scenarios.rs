use super::*;

/// Two failures, then a success: the streak heals and the scan keeps going until three failures
/// in a row finally show up.
#[traced_test]
#[tokio::test]
async fn test_streak_heals_before_threshold() -> TestResult<()> {
  let script = Script::new("SSFFSSFFSS", Schedule::Descending);
  let scanner = Scanner::new(Arc::clone(&script), options(4, 3))?;
  let report = scanner.run_adaptive(month("2023-05"), 1).await?;

  assert_eq!(report.last_success, Some(10));
  assert_eq!(report.stopped_at, Some(13));
  assert_eq!(report.stats.confirmed_successes, 6);
  assert_eq!(report.stats.confirmed_failures, 7);
  assert!(script.cleanups().keys().all(|&position| position > 13));
  Ok(())
}

/// `[S, F, F, F]` with threshold 3 stops at 4 and keeps the failure that tripped the threshold.
#[traced_test]
#[tokio::test]
async fn test_one_success_then_end_of_month() -> TestResult<()> {
  let script = Script::new("SFFF", Schedule::Ascending);
  let scanner = Scanner::new(Arc::clone(&script), options(1, 3))?;
  let report = scanner.run_adaptive(month("2023-05"), 1).await?;

  assert_eq!(report.stopped_at, Some(4));
  assert_eq!(report.last_submitted, Some(4));
  assert_eq!(report.stats, Stats {
    confirmed_successes: 1,
    confirmed_failures:  3,
    probes_discarded:    0,
  });
  assert!(script.cleanups().is_empty());
  Ok(())
}

/// Same outcomes with a wide pool and completions arriving backwards: the counts inside the
/// month do not move, only the number of probes depends on how far ahead the pool ran.
#[traced_test]
#[tokio::test]
async fn test_one_success_then_end_of_month_out_of_order() -> TestResult<()> {
  let script = Script::new("SFFF", Schedule::Descending);
  let scanner = Scanner::new(Arc::clone(&script), options(6, 3))?;
  let report = scanner.run_adaptive(month("2023-05"), 1).await?;

  assert_eq!(report.stopped_at, Some(4));
  assert_eq!(report.stats.confirmed_successes, 1);
  assert_eq!(report.stats.confirmed_failures, 3);
  assert_eq!(report.stats.probes_discarded, report.last_submitted.unwrap() - 4);
  Ok(())
}

/// The scan stops at 5 while 6 is still in flight: 6 is a probe and gets exactly one cleanup.
#[traced_test]
#[tokio::test]
async fn test_in_flight_attempt_past_stop_is_discarded() -> TestResult<()> {
  let script = Script::new("SSFFFF", Schedule::Ascending);
  let scanner = Scanner::new(Arc::clone(&script), options(2, 3))?;
  let report = scanner.run_adaptive(month("2023-05"), 1).await?;

  assert_eq!(report.stopped_at, Some(5));
  assert_eq!(report.last_success, Some(2));
  assert_eq!(report.stats.confirmed_successes, 2);
  assert_eq!(report.stats.confirmed_failures, 3);
  assert!(report.stats.probes_discarded >= 1);

  let cleanups = script.cleanups();
  assert_eq!(cleanups.get(&6), Some(&1));
  assert_eq!(cleanups.values().sum::<u32>() as u64, report.stats.probes_discarded);
  assert!(!cleanups.contains_key(&5));
  Ok(())
}

/// A month whose very first identifiers fail ends right away with no success at all.
#[traced_test]
#[tokio::test]
async fn test_empty_month() -> TestResult<()> {
  let script = Script::new("", Schedule::Scrambled);
  let scanner = Scanner::new(Arc::clone(&script), options(4, 3))?;
  let report = scanner.run_adaptive(month("2023-05"), 1).await?;

  assert_eq!(report.last_success, None);
  assert_eq!(report.stopped_at, Some(3));
  assert_eq!(report.stats.confirmed_failures, 3);
  assert_eq!(report.stats.confirmed_successes, 0);
  Ok(())
}
