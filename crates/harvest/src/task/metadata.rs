//! `metadata.json` for every paper.

use super::*;
use crate::arxiv::{ArxivClient, ArxivEntry};

/// File name of the metadata artifact inside a paper folder.
pub const METADATA_FILE: &str = "metadata.json";

/// Contents of `metadata.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
  /// Versionless identifier, `YYMM.NNNNN`
  pub arxiv_id:          String,
  /// Title of the latest version
  pub paper_title:       String,
  /// Authors of the latest version
  pub authors:           Vec<String>,
  /// Submission date of version 1, `YYYY-MM-DD`
  pub submission_date:   String,
  /// Submission dates of versions 2 and up; `None` where a version could not be looked up
  pub revised_dates:     Vec<Option<String>>,
  /// Highest version number
  pub latest_version:    u32,
  /// Category terms, primary first
  pub categories:        Vec<String>,
  /// Abstract on a single line
  #[serde(rename = "abstract")]
  pub abstract_text:     String,
  /// Link to the PDF of the latest version
  pub pdf_url:           Option<String>,
  /// Journal reference
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub publication_venue: Option<String>,
}

impl MetadataRecord {
  /// Builds the record from the versionless entry and the entries of versions 2 and up.
  ///
  /// # Errors
  ///
  /// [`HarvestError::ApiError`] when the entry carries no submission date.
  pub fn from_entries(
    id: &PaperId,
    base: &ArxivEntry,
    revisions: &[Option<ArxivEntry>],
  ) -> Result<Self> {
    let submission_date = base
      .published
      .map(|date| date.format("%Y-%m-%d").to_string())
      .ok_or_else(|| HarvestError::ApiError(format!("no submission date for {id}")))?;

    let revised_dates = revisions
      .iter()
      .map(|entry| {
        entry.as_ref().and_then(|e| e.updated).map(|date| date.format("%Y-%m-%d").to_string())
      })
      .collect();

    Ok(Self {
      arxiv_id: id.to_string(),
      paper_title: base.title.clone(),
      authors: base.authors.clone(),
      submission_date,
      revised_dates,
      latest_version: base.latest_version(),
      categories: base.categories.clone(),
      abstract_text: base.summary.split_whitespace().collect::<Vec<_>>().join(" "),
      pdf_url: base.pdf_url.clone(),
      publication_venue: base.journal_ref.clone(),
    })
  }
}

/// Counters of the metadata pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataStats {
  /// `metadata.json` files written
  pub saved:  u64,
  /// Papers whose attempt failed. Probes are not counted.
  pub failed: u64,
}

/// Writes `metadata.json` for every paper in the range.
#[derive(Debug)]
pub struct MetadataTask {
  /// arXiv API client
  arxiv:    ArxivClient,
  /// Root of the paper folders
  save_dir: PathBuf,
  /// Papers whose `metadata.json` was written
  saved:    AttemptLog,
  /// Papers whose attempt failed
  failed:   AttemptLog,
}

impl MetadataTask {
  /// Creates the task with a client built from `config`.
  pub fn new(config: &Config) -> Result<Self> {
    Ok(Self {
      arxiv:    ArxivClient::new(config)?,
      save_dir: config.save_dir.clone(),
      saved:    AttemptLog::default(),
      failed:   AttemptLog::default(),
    })
  }

  /// Replaces the arXiv client.
  pub fn with_client(mut self, arxiv: ArxivClient) -> Self {
    self.arxiv = arxiv;
    self
  }

  /// Counters so far.
  pub fn stats(&self) -> MetadataStats {
    MetadataStats { saved: self.saved.count(), failed: self.failed.count() }
  }

  /// Path of `id`'s metadata file.
  pub fn output_path(&self, id: &PaperId) -> PathBuf {
    paper_folder(&self.save_dir, id).join(METADATA_FILE)
  }

  /// Looks up every version of `id` and assembles its record.
  async fn collect(&self, id: &PaperId) -> Result<MetadataRecord> {
    let base = self.arxiv.fetch_entry(&id.to_string()).await?;
    let latest = base.latest_version();
    debug!(%id, latest, "Collecting metadata");

    let mut revisions = Vec::new();
    for version in 2..=latest {
      match self.arxiv.fetch_version(id, version).await {
        Ok(entry) => revisions.push(Some(entry)),
        Err(e) => {
          debug!(%id, version, "Revision lookup failed: {e}");
          revisions.push(None);
        },
      }
    }
    MetadataRecord::from_entries(id, &base, &revisions)
  }
}

#[async_trait]
impl AttemptExecutor for MetadataTask {
  async fn attempt(&self, id: &PaperId) -> Outcome {
    let written = match self.collect(id).await {
      Ok(record) => write_json(&self.output_path(id), &record).await,
      Err(e) => Err(e),
    };
    match written {
      Ok(()) => {
        self.saved.record(id);
        debug!(%id, "Saved metadata");
        Outcome::success()
      },
      Err(e) => {
        self.failed.record(id);
        failed(id, "metadata", &e)
      },
    }
  }

  async fn cleanup(&self, id: &PaperId) {
    self.saved.forget(id);
    self.failed.forget(id);
    remove_quietly(&self.output_path(id)).await;
    remove_dir_if_empty(&paper_folder(&self.save_dir, id)).await;
  }
}
