//! Module for running passes over a range

use harvest::task::{MetadataTask, ReferencesTask, SourceTask};

use super::*;

/// The three kinds of pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
  /// Source archives
  Sources,
  /// `metadata.json`
  Metadata,
  /// `references.json`
  References,
}

impl std::fmt::Display for Pass {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Sources => write!(f, "sources"),
      Self::Metadata => write!(f, "metadata"),
      Self::References => write!(f, "references"),
    }
  }
}

/// Merges the config file, the chosen profile and the command line into one run.
///
/// Everything is validated here, before any request goes out.
pub fn resolve(cli: &Cli, args: &RangeArgs) -> Result<(Config, RangeSpec)> {
  let base = load_config(cli.config.as_ref())?;

  let (mut config, profile_range) = match &args.profile {
    Some(name) => {
      let (config, range) = base.for_profile(name)?;
      (config, Some(range))
    },
    None => (base, None),
  };

  let start_month = match (&args.start_month, &profile_range) {
    (Some(raw), _) => raw.parse::<Month>()?,
    (None, Some(range)) => range.start_month,
    (None, None) => return Err(missing("--start-month")),
  };
  let start_id = args
    .start_id
    .or(profile_range.as_ref().map(|range| range.start_id))
    .ok_or_else(|| missing("--start-id"))?;
  let end_month = match (&args.end_month, &profile_range) {
    (Some(raw), _) => raw.parse::<Month>()?,
    (None, Some(range)) => range.end_month,
    (None, None) => return Err(missing("--end-month")),
  };
  let end_id = args
    .end_id
    .or(profile_range.as_ref().map(|range| range.end_id))
    .ok_or_else(|| missing("--end-id"))?;
  let range = RangeSpec::new(start_month, start_id, end_month, end_id)?;

  if let Some(save_dir) = &args.save_dir {
    config = config.with_save_dir(save_dir);
  }
  if let Some(parallel) = args.parallel {
    config = config.with_max_parallels(parallel);
  }
  if let Some(threshold) = args.threshold {
    config = config.with_failure_threshold(threshold);
  }
  config.scan_options()?;
  config.references_scan_options()?;

  debug!(%range, save_dir = %config.save_dir.display(), "Resolved run");
  Ok((config, range))
}

/// A range bound that neither the command line nor a profile supplied.
fn missing(flag: &str) -> HarvestdError {
  HarvestdError::Usage(format!("{flag} is required unless --profile is given"))
}

/// Function for [`Commands::Sources`], [`Commands::Metadata`] and [`Commands::References`].
pub async fn run(cli: &Cli, args: &RangeArgs, pass: Pass) -> Result<()> {
  let (config, range) = resolve(cli, args)?;
  announce(&config, &range);
  run_pass(&config, &range, pass).await
}

/// Function for [`Commands::All`]: the three passes at once over the same range.
pub async fn run_all(cli: &Cli, args: &RangeArgs) -> Result<()> {
  let (config, range) = resolve(cli, args)?;
  announce(&config, &range);

  let (sources, metadata, references) = tokio::join!(
    run_pass(&config, &range, Pass::Sources),
    run_pass(&config, &range, Pass::Metadata),
    run_pass(&config, &range, Pass::References),
  );
  sources?;
  metadata?;
  references
}

/// Prints what is about to happen.
fn announce(config: &Config, range: &RangeSpec) {
  println!(
    "{} Harvesting {} into {}",
    style(INFO_PREFIX).cyan(),
    style(range).yellow(),
    style(config.save_dir.display()).cyan()
  );
}

/// Runs one pass and prints its summary.
async fn run_pass(config: &Config, range: &RangeSpec, pass: Pass) -> Result<()> {
  info!(%pass, %range, "Starting pass");
  let details = match pass {
    Pass::Sources => {
      let task = Arc::new(SourceTask::new(config)?);
      let report = orchestrate(&task, config.scan_options()?, range).await?;
      let stats = task.stats();
      (report, vec![
        ("papers downloaded", stats.papers_downloaded),
        ("versions extracted", stats.versions_extracted),
        ("extraction failures", stats.extraction_failures),
        ("missing versions", stats.missing_versions),
        ("PDF-only versions", stats.pdfs),
        ("files deleted", stats.files_deleted),
      ])
    },
    Pass::Metadata => {
      let task = Arc::new(MetadataTask::new(config)?);
      let report = orchestrate(&task, config.scan_options()?, range).await?;
      let stats = task.stats();
      (report, vec![("saved", stats.saved), ("failed", stats.failed)])
    },
    Pass::References => {
      let task = Arc::new(ReferencesTask::new(config)?);
      let report = orchestrate(&task, config.references_scan_options()?, range).await?;
      let retried = task.retry_rate_limited().await;
      let stats = task.stats();
      if retried < stats.rate_limited {
        println!(
          "{} references: {} rate-limited papers still missing",
          style(WARNING_PREFIX).yellow(),
          stats.rate_limited - retried
        );
      }
      (report, vec![
        ("saved", stats.saved),
        ("failed", stats.failed),
        ("rate limited", stats.rate_limited),
        ("saved on retry", stats.retried),
      ])
    },
  };

  let (report, counters) = details;
  print_summary(pass, &report, &counters);
  Ok(())
}

/// Drives one task over the range.
async fn orchestrate<E: AttemptExecutor>(
  task: &Arc<E>,
  options: ScanOptions,
  range: &RangeSpec,
) -> Result<RangeReport> {
  Ok(RangeOrchestrator::new(Arc::clone(task), options).run_range(range).await?)
}

/// Prints the scan totals followed by the task's own counters.
fn print_summary(pass: Pass, report: &RangeReport, counters: &[(&str, u64)]) {
  let last = report.last_success().map_or_else(|| "none".to_string(), |id| id.to_string());
  println!(
    "{} {} finished, last paper {}",
    style(SUCCESS_PREFIX).green(),
    style(pass).bold(),
    style(last).yellow()
  );

  let mut lines = vec![
    ("confirmed successes", report.totals.confirmed_successes),
    ("confirmed failures", report.totals.confirmed_failures),
    ("probes discarded", report.totals.probes_discarded),
  ];
  lines.extend_from_slice(counters);
  for (index, (label, value)) in lines.iter().enumerate() {
    let branch = if index + 1 == lines.len() { TREE_LEAF } else { TREE_BRANCH };
    println!("   {} {label}: {}", style(branch).dim(), style(value).cyan());
  }

  for phase in &report.phases {
    debug!(
      month = %phase.month,
      mode = %phase.mode,
      last_success = ?phase.last_success,
      stopped_at = ?phase.stopped_at,
      "Phase summary"
    );
  }
}
