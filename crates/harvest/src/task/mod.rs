//! The per-paper work units the scanner drives.
//!
//! Each task is an [`AttemptExecutor`](crate::scan::AttemptExecutor) writing into its own corner
//! of `<save_dir>/<YYMM-NNNNN>/`:
//!
//! | task               | writes                                     |
//! |--------------------|--------------------------------------------|
//! | [`SourceTask`]     | `<YYMM-NNNNN>vN/` folders, one per version |
//! | [`MetadataTask`]   | `metadata.json`                            |
//! | [`ReferencesTask`] | `references.json`                          |
//!
//! The three passes may run over the same range at the same time, so every cleanup removes only
//! what its own task wrote and then the paper folder only if nothing else is left in it.
//!
//! Every fault inside an attempt (HTTP, parsing, disk) is logged and turned into a failed
//! [`Outcome`](crate::scan::Outcome); none of them reach the scanner as an error.

use std::{
  collections::HashSet,
  sync::{
    atomic::{AtomicU64, Ordering},
    Mutex,
  },
};

use super::*;
use crate::{
  config::Config,
  scan::{AttemptExecutor, Outcome},
};

mod metadata;
mod references;
mod source;

pub use metadata::{MetadataRecord, MetadataStats, MetadataTask};
pub use references::{ReferenceRecord, ReferencesStats, ReferencesTask};
pub use source::{SourceStats, SourceTask};

/// The folder every task writes `id`'s artifacts into.
pub fn paper_folder(save_dir: &Path, id: &PaperId) -> PathBuf { save_dir.join(id.folder_name()) }

/// Removes a file or directory tree. A missing path is fine; anything else is logged.
pub(crate) async fn remove_quietly(path: &Path) {
  let removed = match tokio::fs::symlink_metadata(path).await {
    Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
    Ok(_) => tokio::fs::remove_file(path).await,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
    Err(e) => Err(e),
  };
  match removed {
    Ok(()) => trace!("Removed {}", path.display()),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
    Err(e) => warn!("Could not remove {}: {e}", path.display()),
  }
}

/// Removes `dir` when it exists and is empty.
pub(crate) async fn remove_dir_if_empty(dir: &Path) {
  let Ok(mut entries) = tokio::fs::read_dir(dir).await else { return };
  if let Ok(None) = entries.next_entry().await {
    // A concurrent pass may have written into it since; that error is expected.
    if tokio::fs::remove_dir(dir).await.is_ok() {
      trace!("Removed empty folder {}", dir.display());
    }
  }
}

/// Writes `value` as pretty-printed JSON. A failed write leaves no partial file behind.
pub(crate) async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
  let body = serde_json::to_vec_pretty(value)?;
  if let Some(parent) = path.parent() {
    tokio::fs::create_dir_all(parent).await?;
  }
  if let Err(e) = tokio::fs::write(path, body).await {
    if tokio::fs::remove_file(path).await.is_ok() {
      debug!("Removed partial {}", path.display());
    }
    return Err(e.into());
  }
  Ok(())
}

/// A counter that many concurrent attempts bump.
#[derive(Debug, Default)]
pub(crate) struct Counter(AtomicU64);

impl Counter {
  /// Adds one.
  pub(crate) fn bump(&self) { self.add(1) }

  /// Adds `n`.
  pub(crate) fn add(&self, n: u64) { self.0.fetch_add(n, Ordering::Relaxed); }

  /// Current value.
  pub(crate) fn get(&self) -> u64 { self.0.load(Ordering::Relaxed) }
}

/// The papers whose attempt ended a given way.
///
/// An attempt past the end of a month is only known to be a probe once the scan stops, so cleanup
/// takes it back out with [`forget`](Self::forget) and [`count`](Self::count) ends up covering
/// confirmed attempts only.
#[derive(Debug, Default)]
pub(crate) struct AttemptLog(Mutex<HashSet<PaperId>>);

impl AttemptLog {
  /// Records an attempt on `id`.
  pub(crate) fn record(&self, id: &PaperId) { self.ids().insert(*id); }

  /// Drops `id`, returning whether it was recorded.
  pub(crate) fn forget(&self, id: &PaperId) -> bool { self.ids().remove(id) }

  /// Attempts still recorded.
  pub(crate) fn count(&self) -> u64 { self.ids().len() as u64 }

  /// The set, recovered if a panicking holder poisoned the lock.
  fn ids(&self) -> std::sync::MutexGuard<'_, HashSet<PaperId>> {
    self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}

/// Logs a failed attempt and turns it into an outcome.
pub(crate) fn failed(id: &PaperId, task: &str, error: &HarvestError) -> Outcome {
  match error {
    HarvestError::NotFound(_) => debug!(%id, task, "Not found"),
    _ => warn!(%id, task, "Attempt failed: {error}"),
  }
  Outcome::failure(error.to_string())
}
