//! The real tasks driven by the scanner, with every endpoint pointing at a closed local port.

use std::path::Path;

use flate2::{write::GzEncoder, Compression};
use harvest::{
  arxiv::ArxivClient,
  config::Config,
  extract::ExtractPass,
  semantic::SemanticScholarClient,
  task::{MetadataTask, ReferencesTask, SourceTask},
};

use super::*;

const CLOSED: &str = "http://127.0.0.1:9";

fn offline_config(save_dir: &Path) -> Config {
  Config::default().without_delays().with_save_dir(save_dir).with_max_parallels(2)
}

fn offline_arxiv(config: &Config) -> ArxivClient {
  ArxivClient::new(config)
    .unwrap()
    .with_endpoints(format!("{CLOSED}/api/query"), format!("{CLOSED}/e-print"))
}

fn write_tarball(path: &Path, files: &[(&str, &str)]) {
  let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
  for (name, content) in files {
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, name, content.as_bytes()).unwrap();
  }
  let bytes = builder.into_inner().unwrap().finish().unwrap();
  std::fs::create_dir_all(path.parent().unwrap()).unwrap();
  std::fs::write(path, bytes).unwrap();
}

#[traced_test]
#[tokio::test]
async fn test_metadata_pass_counts_unreachable_papers_as_failures() -> TestResult<()> {
  let dir = tempdir()?;
  let config = offline_config(dir.path());
  let task = Arc::new(MetadataTask::new(&config)?.with_client(offline_arxiv(&config)));

  let range = RangeSpec::new(month("2023-05"), 1, month("2023-05"), 3)?;
  let orchestrator = RangeOrchestrator::new(task.clone(), config.scan_options()?);
  let report = orchestrator.run_range(&range).await?;

  assert_eq!(report.totals.confirmed_failures, 3);
  assert_eq!(report.totals.confirmed_successes, 0);
  assert_eq!(report.last_success(), None);
  assert_eq!(task.stats().failed, 3);
  assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_open_ended_source_pass_stops_and_leaves_nothing() -> TestResult<()> {
  let dir = tempdir()?;
  let config = offline_config(dir.path()).with_failure_threshold(2);
  let task = Arc::new(SourceTask::new(&config)?.with_client(offline_arxiv(&config)));
  let scanner = Scanner::new(task.clone(), config.scan_options()?)?;

  let report = scanner.run_adaptive(month("2023-05"), 1).await?;
  assert_eq!(report.mode, ScanMode::Adaptive);
  assert_eq!(report.stopped_at, Some(2));
  assert_eq!(report.stats.confirmed_failures, 2);
  assert_eq!(report.stats.confirmed_successes, 0);
  assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_metadata_failures_match_the_scan() -> TestResult<()> {
  let dir = tempdir()?;
  let config = offline_config(dir.path()).with_failure_threshold(2).with_max_parallels(4);
  let task = Arc::new(MetadataTask::new(&config)?.with_client(offline_arxiv(&config)));
  let scanner = Scanner::new(task.clone(), config.scan_options()?)?;

  let report = scanner.run_adaptive(month("2023-05"), 1).await?;
  assert_eq!(report.stopped_at, Some(2));
  assert_eq!(task.stats().failed, report.stats.confirmed_failures);
  assert_eq!(task.stats().failed, 2);
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_references_pass_with_single_worker() -> TestResult<()> {
  let dir = tempdir()?;
  let config = offline_config(dir.path());
  let semantic = SemanticScholarClient::new(&config)?.with_endpoint(CLOSED);
  let task =
    Arc::new(ReferencesTask::new(&config)?.with_clients(semantic, offline_arxiv(&config)));

  let options = config.references_scan_options()?;
  assert_eq!(options.concurrency, 1);
  let range = RangeSpec::new(month("2023-05"), 10, month("2023-05"), 11)?;
  let report = RangeOrchestrator::new(task.clone(), options).run_range(&range).await?;

  assert_eq!(report.totals.confirmed_failures, 2);
  assert_eq!(task.retry_rate_limited().await, 0);
  assert_eq!(task.stats().failed, 2);
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_extract_pass_over_a_download_folder() -> TestResult<()> {
  let source = tempdir()?;
  let dest = tempdir()?;
  write_tarball(&source.path().join("2305.04592v1.tar.gz"), &[
    ("main.tex", "\\begin{document}"),
    ("figures/plot.pdf", "%PDF-1.4"),
  ]);
  write_tarball(&source.path().join("nested").join("2305.04593v2.tar.gz"), &[(
    "refs.bib",
    "@article{a}",
  )]);
  std::fs::write(source.path().join("2305.04594v1.tar.gz"), b"%PDF-1.5 not really a tarball")?;
  std::fs::write(source.path().join("2305.04595v1.tar"), b"garbage")?;
  std::fs::write(source.path().join("notes.txt"), b"ignored")?;

  let stats = ExtractPass::new(2).run(source.path(), dest.path()).await?;
  assert_eq!(stats.found, 4);
  assert_eq!(stats.extracted, 2);
  assert_eq!(stats.pdfs, 1);
  assert_eq!(stats.failed, 1);
  assert_eq!(stats.deleted_files, 1);

  assert!(dest.path().join("2305.04592v1").join("main.tex").exists());
  assert!(!dest.path().join("2305.04592v1").join("figures").exists());
  assert!(dest.path().join("2305.04593v2").join("refs.bib").exists());
  assert!(!dest.path().join("2305.04595v1").exists());
  Ok(())
}
