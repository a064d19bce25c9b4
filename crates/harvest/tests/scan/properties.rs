use super::*;

const PATTERN: &str = "SSFSFFSSSFFSFSS";
const SCHEDULES: [Schedule; 3] = [Schedule::Ascending, Schedule::Descending, Schedule::Scrambled];

#[traced_test]
#[tokio::test]
async fn test_results_do_not_depend_on_completion_order() -> TestResult<()> {
  let mut seen = Vec::new();
  for schedule in SCHEDULES {
    let script = Script::new(PATTERN, schedule);
    let scanner = Scanner::new(Arc::clone(&script), options(6, 3))?;
    let report = scanner.run_adaptive(month("2023-05"), 1).await?;
    seen.push((
      report.stats.confirmed_successes,
      report.stats.confirmed_failures,
      report.last_success,
      report.stopped_at,
    ));
  }

  // 9 successes and 6 failures in the pattern, then 16..=18 end the month.
  assert_eq!(seen[0], (9, 9, Some(15), Some(18)));
  assert!(seen.iter().all(|s| *s == seen[0]), "{seen:?}");
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_stop_happens_exactly_at_threshold() -> TestResult<()> {
  for threshold in 1..=4u32 {
    let script = Script::new("SSS", Schedule::Scrambled);
    let scanner = Scanner::new(Arc::clone(&script), options(4, threshold))?;
    let report = scanner.run_adaptive(month("2023-05"), 1).await?;

    assert_eq!(report.stopped_at, Some(3 + u64::from(threshold)));
    assert_eq!(report.stats.confirmed_failures, u64::from(threshold));
    assert_eq!(report.stats.confirmed_successes, 3);
  }
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_every_probe_is_cleaned_up_once() -> TestResult<()> {
  for schedule in SCHEDULES {
    let script = Script::new("SSSSF", schedule);
    let scanner = Scanner::new(Arc::clone(&script), options(8, 3))?;
    let report = scanner.run_adaptive(month("2023-05"), 1).await?;

    let stop = report.stopped_at.unwrap();
    let last = report.last_submitted.unwrap();
    assert_eq!(stop, 7);
    assert_eq!(report.stats.probes_discarded, last - stop);

    let cleanups = script.cleanups();
    assert_eq!(cleanups.len() as u64, report.stats.probes_discarded);
    for position in stop + 1..=last {
      assert_eq!(cleanups.get(&position), Some(&1), "probe {position} not cleaned exactly once");
    }
    assert!(cleanups.keys().all(|&position| position > stop));
  }
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_each_attempt_is_counted_once() -> TestResult<()> {
  for schedule in SCHEDULES {
    let script = Script::new(PATTERN, schedule);
    let scanner = Scanner::new(Arc::clone(&script), options(5, 3))?;
    let report = scanner.run_adaptive(month("2023-05"), 1).await?;

    let attempts = script.attempts();
    assert!(attempts.values().all(|&n| n == 1));
    assert_eq!(attempts.len() as u64, report.stats.total());
    assert_eq!(report.last_submitted, Some(report.stats.total()));
  }
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_exhaustive_never_probes() -> TestResult<()> {
  let script = Script::new("SFFFFFFFFS", Schedule::Descending);
  let scanner = Scanner::new(Arc::clone(&script), options(4, 3))?;
  let report = scanner.run_exhaustive(month("2023-05"), 1, 12).await?;

  assert_eq!(report.mode, ScanMode::Exhaustive);
  assert_eq!(report.stats.confirmed_successes, 2);
  assert_eq!(report.stats.confirmed_failures, 10);
  assert_eq!(report.stats.probes_discarded, 0);
  assert_eq!(report.stopped_at, None);
  assert!(script.cleanups().is_empty());
  assert_eq!(script.attempts().len(), 12);
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_pool_width_is_respected() -> TestResult<()> {
  let script = Script::new(&"S".repeat(40), Schedule::Scrambled);
  let scanner = Scanner::new(Arc::clone(&script), options(3, 3))?;
  let report = scanner.run_adaptive(month("2023-05"), 1).await?;

  assert_eq!(report.stats.confirmed_successes, 40);
  assert!(script.peak() <= 3);
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_range_totals_sum_phases() -> TestResult<()> {
  let script = Script::new("SSSSSS", Schedule::Scrambled);
  let range = RangeSpec::new(month("2023-04"), 2, month("2023-05"), 4)?;
  let report = RangeOrchestrator::new(Arc::clone(&script), options(4, 2)).run_range(&range).await?;

  assert_eq!(report.phases.len(), 2);
  assert_eq!(report.phases[0].stats.confirmed_successes, 5);
  assert_eq!(report.phases[0].stopped_at, Some(8));
  assert_eq!(report.phases[1].stats.confirmed_successes, 4);

  let mut summed = Stats::default();
  report.phases.iter().for_each(|phase| summed += phase.stats);
  assert_eq!(summed, report.totals);
  Ok(())
}
