//! `references.json` for every paper: which arXiv papers it cites.

use tokio::sync::Mutex;

use super::*;
use crate::{
  arxiv::{ArxivClient, ArxivEntry},
  semantic::{Reference, SemanticScholarClient},
};

/// File name of the references artifact inside a paper folder.
pub const REFERENCES_FILE: &str = "references.json";

/// One cited paper, as stored in `references.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRecord {
  /// Title of the cited paper, as arXiv has it
  pub title:               String,
  /// Author names in listed order
  pub authors:             Vec<String>,
  /// `YYYY-MM-DD` of the cited paper's first version
  pub submission_date:     Option<String>,
  /// Semantic Scholar's paper id, when it has one
  pub semantic_scholar_id: Option<String>,
}

impl ReferenceRecord {
  /// Combines the cited paper's arXiv entry with what Semantic Scholar knows about it.
  pub fn new(entry: &ArxivEntry, reference: &Reference) -> Self {
    Self {
      title:               entry.title.clone(),
      authors:             entry.authors.clone(),
      submission_date:     entry.published.map(|date| date.format("%Y-%m-%d").to_string()),
      semantic_scholar_id: reference.semantic_scholar_id.clone(),
    }
  }
}

/// Counters of the references pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferencesStats {
  /// `references.json` files written, retries included
  pub saved:        u64,
  /// Papers that failed for any reason other than rate limiting, or failed their retry
  pub failed:       u64,
  /// Papers Semantic Scholar turned away with HTTP 429
  pub rate_limited: u64,
  /// Rate-limited papers saved on retry
  pub retried:      u64,
}

/// Writes `references.json` for every paper in the range.
///
/// Papers that Semantic Scholar rate-limits count as failed attempts for the scan and are queued.
/// Once the scan is over, [`retry_rate_limited`](Self::retry_rate_limited) gives each of them one
/// more try.
#[derive(Debug)]
pub struct ReferencesTask {
  /// Source of the citation lists
  semantic:     SemanticScholarClient,
  /// Resolves every cited identifier to its title, authors and date
  arxiv:        ArxivClient,
  /// Root of the paper folders
  save_dir:     PathBuf,
  /// Pause before the rate-limited papers get their second try
  retry_delay:  Duration,
  /// Papers waiting for a retry, in the order they were turned away
  queue:        Mutex<Vec<PaperId>>,
  /// Papers whose `references.json` was written
  saved:        AttemptLog,
  /// Papers that failed without being rate limited
  failed:       AttemptLog,
  /// Papers turned away with HTTP 429
  rate_limited: AttemptLog,
  /// Retries that succeeded
  retried:      Counter,
}

impl ReferencesTask {
  /// Creates the task with clients built from `config`.
  pub fn new(config: &Config) -> Result<Self> {
    Ok(Self {
      semantic:     SemanticScholarClient::new(config)?,
      arxiv:        ArxivClient::new(config)?,
      save_dir:     config.save_dir.clone(),
      retry_delay:  config.rate_limit_retry_delay(),
      queue:        Mutex::new(Vec::new()),
      saved:        AttemptLog::default(),
      failed:       AttemptLog::default(),
      rate_limited: AttemptLog::default(),
      retried:      Counter::default(),
    })
  }

  /// Replaces both clients.
  pub fn with_clients(mut self, semantic: SemanticScholarClient, arxiv: ArxivClient) -> Self {
    self.semantic = semantic;
    self.arxiv = arxiv;
    self
  }

  /// Counters so far.
  pub fn stats(&self) -> ReferencesStats {
    ReferencesStats {
      saved:        self.saved.count(),
      failed:       self.failed.count(),
      rate_limited: self.rate_limited.count(),
      retried:      self.retried.get(),
    }
  }

  /// Path of `id`'s references file.
  pub fn output_path(&self, id: &PaperId) -> PathBuf {
    paper_folder(&self.save_dir, id).join(REFERENCES_FILE)
  }

  /// Papers currently waiting for a retry.
  pub async fn queued(&self) -> Vec<PaperId> { self.queue.lock().await.clone() }

  /// Gives every rate-limited paper one more try after the configured delay.
  ///
  /// Returns how many of them were saved. Papers turned away again are not queued a second time.
  pub async fn retry_rate_limited(&self) -> u64 {
    let queued = std::mem::take(&mut *self.queue.lock().await);
    if queued.is_empty() {
      return 0;
    }

    info!("Retrying {} rate-limited papers in {:?}", queued.len(), self.retry_delay);
    tokio::time::sleep(self.retry_delay).await;

    let mut saved = 0;
    for id in queued {
      match self.save(&id).await {
        Ok(count) => {
          debug!(%id, count, "Saved references on retry");
          self.saved.record(&id);
          self.retried.bump();
          saved += 1;
        },
        Err(e) => {
          self.failed.record(&id);
          warn!(%id, "Retry failed: {e}");
        },
      }
    }
    saved
  }

  /// Looks up every arXiv paper `id` cites. Lookups that fail are skipped.
  async fn collect(&self, id: &PaperId) -> Result<BTreeMap<String, ReferenceRecord>> {
    let references = self.semantic.references(id).await?;
    debug!(%id, "Found {} arXiv references", references.len());

    let mut records = BTreeMap::new();
    for reference in references {
      match self.arxiv.fetch_entry(&reference.arxiv_id).await {
        Ok(entry) => {
          records.insert(reference.arxiv_id.clone(), ReferenceRecord::new(&entry, &reference));
        },
        Err(e) => debug!(%id, "Skipping reference {}: {e}", reference.arxiv_id),
      }
    }
    Ok(records)
  }

  /// Collects and writes `id`'s references, returning how many were written.
  async fn save(&self, id: &PaperId) -> Result<usize> {
    let records = self.collect(id).await?;
    write_json(&self.output_path(id), &records).await?;
    Ok(records.len())
  }
}

#[async_trait]
impl AttemptExecutor for ReferencesTask {
  async fn attempt(&self, id: &PaperId) -> Outcome {
    match self.save(id).await {
      Ok(count) => {
        debug!(%id, count, "Saved references");
        self.saved.record(id);
        Outcome::success()
      },
      Err(e @ HarvestError::RateLimited(_)) => {
        info!(%id, "Rate limited, queued for retry");
        self.rate_limited.record(id);
        self.queue.lock().await.push(*id);
        Outcome::failure(e.to_string())
      },
      Err(e) => {
        self.failed.record(id);
        failed(id, "references", &e)
      },
    }
  }

  async fn cleanup(&self, id: &PaperId) {
    // A probe that was rate limited must not be retried either.
    self.queue.lock().await.retain(|queued| queued != id);
    self.saved.forget(id);
    self.failed.forget(id);
    self.rate_limited.forget(id);
    remove_quietly(&self.output_path(id)).await;
    remove_dir_if_empty(&paper_folder(&self.save_dir, id)).await;
  }
}
