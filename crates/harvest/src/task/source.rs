//! LaTeX sources of every version of every paper.

use super::*;
use crate::{
  arxiv::ArxivClient,
  extract::{extract_and_filter, ExtractOutcome},
};

/// Counters of the source pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStats {
  /// Papers whose every version was handled
  pub papers_downloaded:   u64,
  /// Versions unpacked into a source folder
  pub versions_extracted:  u64,
  /// Versions whose archive would not unpack
  pub extraction_failures: u64,
  /// Versions with no archive on arXiv
  pub missing_versions:    u64,
  /// Versions that were submitted as a PDF only
  pub pdfs:                u64,
  /// Non-source files removed after unpacking
  pub files_deleted:       u64,
}

/// Downloads and unpacks the sources of every version of every paper in the range.
///
/// Version `N` of `YYMM.NNNNN` lands in `<save_dir>/YYMM-NNNNN/YYMM-NNNNNvN/` holding only its
/// `.tex` and `.bib` files. The downloaded archive is removed once it has been handled.
#[derive(Debug)]
pub struct SourceTask {
  /// Looks up the latest version and downloads the archives
  arxiv:               ArxivClient,
  /// Root of the paper folders
  save_dir:            PathBuf,
  /// Papers whose every version was handled
  papers_downloaded:   AttemptLog,
  /// Versions unpacked into a source folder
  versions_extracted:  Counter,
  /// Archives that would not unpack
  extraction_failures: Counter,
  /// Versions arXiv had no archive for
  missing_versions:    Counter,
  /// Versions shipped as a bare PDF
  pdfs:                Counter,
  /// Non-source files removed after unpacking
  files_deleted:       Counter,
}

impl SourceTask {
  /// Creates the task with a client built from `config`.
  pub fn new(config: &Config) -> Result<Self> {
    Ok(Self {
      arxiv:               ArxivClient::new(config)?,
      save_dir:            config.save_dir.clone(),
      papers_downloaded:   AttemptLog::default(),
      versions_extracted:  Counter::default(),
      extraction_failures: Counter::default(),
      missing_versions:    Counter::default(),
      pdfs:                Counter::default(),
      files_deleted:       Counter::default(),
    })
  }

  /// Replaces the arXiv client.
  pub fn with_client(mut self, arxiv: ArxivClient) -> Self {
    self.arxiv = arxiv;
    self
  }

  /// Counters so far.
  pub fn stats(&self) -> SourceStats {
    SourceStats {
      papers_downloaded:   self.papers_downloaded.count(),
      versions_extracted:  self.versions_extracted.get(),
      extraction_failures: self.extraction_failures.get(),
      missing_versions:    self.missing_versions.get(),
      pdfs:                self.pdfs.get(),
      files_deleted:       self.files_deleted.get(),
    }
  }

  /// Where the archive of one version is downloaded to.
  pub fn archive_path(&self, id: &PaperId, version: u32) -> PathBuf {
    paper_folder(&self.save_dir, id).join(format!("{}.tar.gz", id.versioned(version)))
  }

  /// Unpacks a downloaded archive next to it and removes the archive.
  ///
  /// Returns whether the version counts as handled.
  pub async fn process_archive(&self, id: &PaperId, version: u32, archive: &Path) -> bool {
    let folder = paper_folder(&self.save_dir, id);
    let base_name = format!("{}v{version}", id.folder_name());

    let extracted = tokio::task::spawn_blocking({
      let archive = archive.to_path_buf();
      move || extract_and_filter(&archive, &folder, &base_name)
    })
    .await
    .map_err(|e| HarvestError::WorkerLost(e.to_string()))
    .and_then(|result| result);
    remove_quietly(archive).await;

    match extracted {
      Ok(ExtractOutcome::Extracted { deleted, .. }) => {
        self.versions_extracted.bump();
        self.files_deleted.add(deleted as u64);
        true
      },
      Ok(ExtractOutcome::Pdf) => {
        debug!(%id, version, "Submitted as PDF only");
        self.pdfs.bump();
        true
      },
      Err(e) => {
        warn!(%id, version, "Extraction failed: {e}");
        self.extraction_failures.bump();
        false
      },
    }
  }

  /// Downloads and unpacks one version.
  async fn fetch_version(&self, id: &PaperId, version: u32) -> bool {
    let archive = self.archive_path(id, version);
    match self.arxiv.download_source(id, version, &archive).await {
      Ok(_) => self.process_archive(id, version, &archive).await,
      Err(HarvestError::NotFound(_)) => {
        debug!(%id, version, "No source archive for this version");
        self.missing_versions.bump();
        false
      },
      Err(e) => {
        warn!(%id, version, "Download failed: {e}");
        remove_quietly(&archive).await;
        false
      },
    }
  }
}

#[async_trait]
impl AttemptExecutor for SourceTask {
  async fn attempt(&self, id: &PaperId) -> Outcome {
    let latest = match self.arxiv.fetch_entry(&id.to_string()).await {
      Ok(entry) => entry.latest_version(),
      Err(e) => return failed(id, "sources", &e),
    };

    let mut handled = 0;
    for version in 1..=latest {
      if self.fetch_version(id, version).await {
        handled += 1;
      }
    }

    if handled == latest {
      self.papers_downloaded.record(id);
      debug!(%id, latest, "Sources complete");
      Outcome::success()
    } else {
      warn!(%id, "Only {handled} of {latest} versions handled");
      Outcome::failure(format!("{handled} of {latest} versions handled"))
    }
  }

  async fn cleanup(&self, id: &PaperId) {
    self.papers_downloaded.forget(id);
    let folder = paper_folder(&self.save_dir, id);
    let Ok(mut entries) = tokio::fs::read_dir(&folder).await else { return };

    let version_prefix = format!("{}v", id.folder_name());
    let archive_prefix = format!("{id}v");
    while let Ok(Some(entry)) = entries.next_entry().await {
      let name = entry.file_name().to_string_lossy().into_owned();
      let is_version_dir = name.starts_with(&version_prefix);
      let is_archive = name.starts_with(&archive_prefix) && name.ends_with(".tar.gz");
      if is_version_dir || is_archive {
        remove_quietly(&entry.path()).await;
      }
    }
    remove_dir_if_empty(&folder).await;
  }
}
