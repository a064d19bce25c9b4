//! Archive sniffing, extraction and filtering.
//!
//! arXiv's e-print endpoint serves whatever the authors uploaded: usually a gzipped tarball,
//! sometimes a single gzipped `.tex` file, sometimes a bare tarball, and for PDF-only submissions
//! the PDF itself. Nothing in the URL or the response says which, so [`sniff`] looks at the magic
//! bytes. [`extract_and_filter`] unpacks whatever it found and keeps only `.tex` and `.bib` files.
//!
//! Everything here is blocking I/O; async callers go through `spawn_blocking`.
//!
//! # Examples
//!
//! ```no_run
//! use std::path::Path;
//!
//! use harvest::extract::{extract_and_filter, sniff, ArchiveKind};
//!
//! # fn example() -> harvest::error::Result<()> {
//! let archive = Path::new("papers/2305-04592/2305.04592v1.tar.gz");
//! if sniff(archive)? != ArchiveKind::Pdf {
//!   let outcome = extract_and_filter(archive, Path::new("papers/2305-04592"), "2305-04592v1")?;
//!   println!("{outcome:?}");
//! }
//! # Ok(())
//! # }
//! ```

use std::{
  fs::File,
  io::{self, Read},
};

use flate2::read::GzDecoder;
use walkdir::WalkDir;

use super::*;
use crate::scan::WorkerPool;

/// File extensions that survive filtering, compared case-insensitively.
pub const KEPT_EXTENSIONS: [&str; 2] = ["tex", "bib"];

lazy_static! {
  /// Archive suffix stripped to name the extraction folder.
  static ref TAR_SUFFIX: Regex = Regex::new(r"\.tar(\.gz)?$").unwrap();
}

/// What a downloaded source file turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveKind {
  /// A PDF-only submission
  Pdf,
  /// An uncompressed tarball
  Tar,
  /// A gzipped tarball
  TarGz,
  /// A single gzipped file, with the name recorded in the gzip header when there is one
  Gzip {
    /// Original file name from the gzip header
    original_name: Option<String>,
  },
  /// Anything else
  Unknown,
}

/// Result of a successful [`extract_and_filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractOutcome {
  /// Unpacked and filtered
  Extracted {
    /// Files that survived filtering
    kept:    usize,
    /// Files removed by filtering
    deleted: usize,
  },
  /// A PDF; nothing was extracted
  Pdf,
}

/// Identifies `path` by its leading bytes.
pub fn sniff(path: &Path) -> Result<ArchiveKind> {
  let mut head = Vec::with_capacity(512);
  File::open(path)?.take(512).read_to_end(&mut head)?;

  if head.starts_with(b"%PDF") {
    return Ok(ArchiveKind::Pdf);
  }
  if is_tar(&head) {
    return Ok(ArchiveKind::Tar);
  }
  if !head.starts_with(&[0x1f, 0x8b]) {
    return Ok(ArchiveKind::Unknown);
  }

  let mut decoder = GzDecoder::new(File::open(path)?);
  let mut inner = Vec::with_capacity(512);
  if let Err(e) = decoder.by_ref().take(512).read_to_end(&mut inner) {
    debug!("Corrupt gzip stream in {}: {e}", path.display());
    return Ok(ArchiveKind::Unknown);
  }
  if is_tar(&inner) {
    return Ok(ArchiveKind::TarGz);
  }

  let original_name = decoder
    .header()
    .and_then(|header| header.filename())
    .map(|name| String::from_utf8_lossy(name).into_owned())
    .and_then(|name| Path::new(&name).file_name().map(|n| n.to_string_lossy().into_owned()));
  Ok(ArchiveKind::Gzip { original_name })
}

/// Whether `block` starts with a POSIX tar header.
fn is_tar(block: &[u8]) -> bool { block.len() >= 262 && &block[257..262] == b"ustar" }

/// Unpacks `archive` into `dest_dir/base_name` and strips everything but `.tex` and `.bib` files.
///
/// A failed unpack removes the partially written folder before returning the error.
///
/// # Errors
///
/// [`HarvestError::Extraction`] for unknown formats and for archives that fail to unpack.
pub fn extract_and_filter(
  archive: &Path,
  dest_dir: &Path,
  base_name: &str,
) -> Result<ExtractOutcome> {
  let target = dest_dir.join(base_name);
  if unpack(archive, &target)? == ArchiveKind::Pdf {
    return Ok(ExtractOutcome::Pdf);
  }

  let (kept, deleted) = filter_sources(&target)?;
  debug!(
    "Extracted {} into {} ({kept} kept, {deleted} deleted)",
    archive.display(),
    target.display()
  );
  Ok(ExtractOutcome::Extracted { kept, deleted })
}

/// Unpacks `archive` into `target` as it is and returns what the archive turned out to be.
///
/// A PDF is left where it is and nothing is written. A single gzipped file without a name in its
/// header is written as `<target name>.file`. A failed unpack removes `target` again.
///
/// # Errors
///
/// [`HarvestError::Extraction`] for unknown formats and for archives that fail to unpack.
pub fn unpack(archive: &Path, target: &Path) -> Result<ArchiveKind> {
  let kind = sniff(archive)?;
  trace!("{} sniffed as {kind:?}", archive.display());

  let unpacked = match &kind {
    ArchiveKind::Pdf => return Ok(kind),
    ArchiveKind::Unknown =>
      return Err(HarvestError::Extraction(format!(
        "unsupported format: {}",
        archive.display()
      ))),
    ArchiveKind::Tar => unpack_tar(File::open(archive)?, target),
    ArchiveKind::TarGz => unpack_tar(GzDecoder::new(File::open(archive)?), target),
    ArchiveKind::Gzip { original_name } => {
      let name = original_name.clone().unwrap_or_else(|| {
        let stem = target.file_name().unwrap_or_default().to_string_lossy();
        format!("{stem}.file")
      });
      gunzip(archive, &target.join(name))
    },
  };

  if let Err(e) = unpacked {
    if target.exists() {
      if let Err(cleanup) = std::fs::remove_dir_all(target) {
        warn!("Could not remove partial extraction {}: {cleanup}", target.display());
      }
    }
    return Err(HarvestError::Extraction(format!("{}: {e}", archive.display())));
  }
  Ok(kind)
}

/// Unpacks a tar stream into `target`.
fn unpack_tar(reader: impl Read, target: &Path) -> io::Result<()> {
  std::fs::create_dir_all(target)?;
  tar::Archive::new(reader).unpack(target)
}

/// Decompresses a single gzipped file to `output`.
fn gunzip(archive: &Path, output: &Path) -> io::Result<()> {
  if let Some(parent) = output.parent() {
    std::fs::create_dir_all(parent)?;
  }
  let mut decoder = GzDecoder::new(File::open(archive)?);
  let mut file = File::create(output)?;
  io::copy(&mut decoder, &mut file)?;
  Ok(())
}

/// Whether a file name carries one of [`KEPT_EXTENSIONS`].
fn is_kept(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .is_some_and(|ext| KEPT_EXTENSIONS.iter().any(|kept| ext.eq_ignore_ascii_case(kept)))
}

/// Deletes every non-source file under `root` and prunes the directories left empty.
///
/// Returns `(kept, deleted)` file counts. `root` itself is never removed.
pub fn filter_sources(root: &Path) -> Result<(usize, usize)> {
  let mut kept = 0;
  let mut deleted = 0;

  for entry in WalkDir::new(root).contents_first(true) {
    let entry = entry?;
    let path = entry.path();
    if entry.file_type().is_dir() {
      if path != root && std::fs::read_dir(path)?.next().is_none() {
        std::fs::remove_dir(path)?;
      }
    } else if is_kept(path) {
      kept += 1;
    } else {
      std::fs::remove_file(path)?;
      deleted += 1;
    }
  }
  Ok((kept, deleted))
}

/// Counters of a standalone extraction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractStats {
  /// Archives found under the source directory
  pub found:         u64,
  /// Archives unpacked and filtered
  pub extracted:     u64,
  /// Archives that failed to unpack
  pub failed:        u64,
  /// PDF-only submissions skipped
  pub pdfs:          u64,
  /// Files removed by filtering
  pub deleted_files: u64,
}

/// Unpacks every archive under a directory, in parallel.
#[derive(Debug, Clone, Copy)]
pub struct ExtractPass {
  /// Archives unpacked at once
  concurrency: usize,
}

impl ExtractPass {
  /// Creates a pass running `concurrency` extractions at a time.
  pub fn new(concurrency: usize) -> Self { Self { concurrency } }

  /// Every `*.tar*` file under `source_dir`, in path order.
  pub fn find_archives(source_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut archives = Vec::new();
    for entry in WalkDir::new(source_dir).sort_by_file_name() {
      let entry = entry?;
      if entry.file_type().is_file() && entry.file_name().to_string_lossy().contains(".tar") {
        archives.push(entry.into_path());
      }
    }
    Ok(archives)
  }

  /// Extracts every archive under `source_dir` into its own folder under `dest_dir`.
  ///
  /// Each archive lands in a folder named after it with the `.tar` or `.tar.gz` suffix removed.
  /// Individual failures are counted, not returned.
  pub async fn run(&self, source_dir: &Path, dest_dir: &Path) -> Result<ExtractStats> {
    let archives = Self::find_archives(source_dir)?;
    tokio::fs::create_dir_all(dest_dir).await?;
    info!("Found {} archives under {}", archives.len(), source_dir.display());

    let mut stats = ExtractStats { found: archives.len() as u64, ..Default::default() };
    let mut pool = WorkerPool::new(self.concurrency)?;
    let mut pending = archives.into_iter();

    loop {
      while pool.has_capacity() {
        let Some(archive) = pending.next() else { break };
        let dest_dir = dest_dir.to_path_buf();
        pool.submit(async move {
          let name = archive.file_name().unwrap_or_default().to_string_lossy().into_owned();
          let base_name = TAR_SUFFIX.replace(&name, "").into_owned();
          let result = tokio::task::spawn_blocking({
            let archive = archive.clone();
            move || extract_and_filter(&archive, &dest_dir, &base_name)
          })
          .await
          .map_err(|e| HarvestError::WorkerLost(e.to_string()))
          .and_then(|result| result);
          (archive, result)
        });
      }

      let Some(joined) = pool.next_completed().await else { break };
      let (archive, result) = joined.map_err(|e| HarvestError::WorkerLost(e.to_string()))?;
      match result {
        Ok(ExtractOutcome::Extracted { deleted, .. }) => {
          stats.extracted += 1;
          stats.deleted_files += deleted as u64;
        },
        Ok(ExtractOutcome::Pdf) => stats.pdfs += 1,
        Err(e) => {
          warn!("Failed to extract {}: {e}", archive.display());
          stats.failed += 1;
        },
      }
    }

    info!(
      "Extraction pass done: {} extracted, {} failed, {} PDFs",
      stats.extracted, stats.failed, stats.pdfs
    );
    Ok(stats)
  }
}
