use std::{
  collections::HashMap,
  error::Error,
  sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
  },
  time::Duration,
};

use harvest::{
  prelude::*,
  scan::{RangeOrchestrator, ScanMode, ScanOptions, Scanner},
};
use tempfile::tempdir;
use tracing_test::traced_test;

mod scan;
mod tasks;

pub type TestResult<T> = std::result::Result<T, Box<dyn Error>>;

pub fn month(s: &str) -> Month { s.parse().unwrap() }
