//! Integration tests for the harvest CLI.
//!
//! Every test points `--config` at a temporary file and stops before the first request, so none
//! of them needs the network.

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

// Helper function to create a clean command instance
fn harvest() -> Command { Command::cargo_bin("harvest").unwrap() }

// Helper to write a starter config into a temporary directory
fn initialized() -> (tempfile::TempDir, PathBuf) {
  let dir = tempdir().unwrap();
  let config = dir.path().join("config.toml");
  harvest().arg("init").arg("--config").arg(&config).assert().success();
  (dir, config)
}

#[test]
fn test_help_lists_passes() {
  harvest()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("sources"))
    .stdout(predicate::str::contains("metadata"))
    .stdout(predicate::str::contains("references"))
    .stdout(predicate::str::contains("extract"))
    .stdout(predicate::str::contains("organize"));
}

#[test]
fn test_init_writes_profiles() {
  let dir = tempdir().unwrap();
  let config = dir.path().join("nested").join("config.toml");

  harvest()
    .arg("init")
    .arg("--config")
    .arg(&config)
    .assert()
    .success()
    .stdout(predicate::str::contains("Created config"))
    .stdout(predicate::str::contains("april-tail"));

  let written = std::fs::read_to_string(&config).unwrap();
  assert!(written.contains("max_parallels = 10"));
  assert!(written.contains("[profiles.test]"));
}

#[test]
fn test_init_keeps_existing_config() {
  let (_dir, config) = initialized();
  std::fs::write(&config, "max_parallels = 4\n").unwrap();

  harvest()
    .arg("init")
    .arg("--config")
    .arg(&config)
    .assert()
    .success()
    .stdout(predicate::str::contains("--force"));
  assert_eq!(std::fs::read_to_string(&config).unwrap(), "max_parallels = 4\n");

  harvest().arg("init").arg("--force").arg("--config").arg(&config).assert().success();
  assert!(std::fs::read_to_string(&config).unwrap().contains("[profiles.test]"));
}

#[test]
fn test_reversed_range_is_rejected() {
  let (dir, config) = initialized();
  let save_dir = dir.path().join("papers");

  harvest()
    .args(["sources", "--start-month", "2023-05", "--start-id", "10"])
    .args(["--end-month", "2023-04", "--end-id", "1"])
    .arg("--save-dir")
    .arg(&save_dir)
    .arg("--config")
    .arg(&config)
    .assert()
    .failure()
    .stderr(predicate::str::contains("Invalid range"));
  assert!(!save_dir.exists());
}

#[test]
fn test_missing_bounds_are_rejected() {
  let (_dir, config) = initialized();

  harvest()
    .args(["metadata", "--start-month", "2023-05", "--start-id", "10"])
    .arg("--config")
    .arg(&config)
    .assert()
    .failure()
    .stderr(predicate::str::contains("--end-month is required"));
}

#[test]
fn test_unknown_profile_is_rejected() {
  let (_dir, config) = initialized();

  harvest()
    .args(["all", "--profile", "does-not-exist"])
    .arg("--config")
    .arg(&config)
    .assert()
    .failure()
    .stderr(predicate::str::contains("unknown profile"));
}

#[test]
fn test_zero_parallelism_is_rejected() {
  let (_dir, config) = initialized();

  harvest()
    .args(["references", "--profile", "test", "--parallel", "0"])
    .arg("--config")
    .arg(&config)
    .assert()
    .failure()
    .stderr(predicate::str::contains("concurrency must be at least 1"));
}

#[test]
fn test_bad_month_is_rejected() {
  let (_dir, config) = initialized();

  harvest()
    .args(["sources", "--profile", "test", "--start-month", "2023-13"])
    .arg("--config")
    .arg(&config)
    .assert()
    .failure()
    .stderr(predicate::str::contains("Invalid month"));
}

#[test]
fn test_extract_empty_folder() {
  let source = tempdir().unwrap();
  let dest = tempdir().unwrap();
  std::fs::write(source.path().join("notes.txt"), "not an archive").unwrap();

  harvest()
    .arg("extract")
    .arg(source.path())
    .arg(dest.path().join("out"))
    .assert()
    .success()
    .stdout(predicate::str::contains("Extracted 0 of 0 archives"));
  assert!(dest.path().join("out").is_dir());
}

#[test]
fn test_extract_requires_source_folder() {
  let dest = tempdir().unwrap();

  harvest()
    .arg("extract")
    .arg(dest.path().join("missing"))
    .arg(dest.path())
    .assert()
    .failure()
    .stderr(predicate::str::contains("is not a directory"));
}

#[test]
fn test_organize_empty_folder() {
  let (dir, config) = initialized();
  let sources = dir.path().join("downloads");
  std::fs::create_dir_all(&sources).unwrap();
  std::fs::write(sources.join("notes.txt"), "not an archive").unwrap();

  harvest()
    .arg("organize")
    .arg(&sources)
    .arg(dir.path().join("organized"))
    .arg("--config")
    .arg(&config)
    .assert()
    .success()
    .stdout(predicate::str::contains("Organized 0 papers"));
}

#[test]
fn test_organize_requires_source_folder() {
  let (dir, config) = initialized();

  harvest()
    .arg("organize")
    .arg(dir.path().join("missing"))
    .arg(dir.path())
    .arg("--config")
    .arg(&config)
    .assert()
    .failure()
    .stderr(predicate::str::contains("is not a directory"));
}
