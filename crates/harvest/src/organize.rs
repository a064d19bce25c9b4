//! Regrouping a flat folder of downloaded source archives into per-paper folders.
//!
//! Given archives named like the sources pass downloads them (`2305.04592v1.tar.gz`,
//! `2305.04592v2.tar.gz`, ...), [`OrganizePass`] builds one folder per paper:
//!
//! ```text
//! <output>/2305-04592/
//! ├── tex/
//! │   ├── v1/          every file of the v1 archive, unfiltered
//! │   └── v2/
//! └── references.bib   a BibTeX entry citing the paper itself
//! ```
//!
//! The BibTeX entry is built from the arXiv API. When the lookup fails a stub entry holding only
//! the identifier and its URL is written instead, so every paper folder ends up with a
//! `references.bib`.

use walkdir::WalkDir;

use super::*;
use crate::{
  arxiv::{ArxivClient, ArxivEntry},
  config::Config,
  extract::{unpack, ArchiveKind},
};

/// Name of the citation file written into every paper folder.
pub const BIB_FILE: &str = "references.bib";

/// Suffix of the archives picked up by [`OrganizePass::find_papers`].
const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// Escapes the braces that would otherwise unbalance a BibTeX field.
fn escape(value: &str) -> String { value.replace('{', r"\{").replace('}', r"\}") }

/// The BibTeX entry citing `id`.
///
/// With the arXiv `entry` at hand the entry carries title, authors, date, primary category and
/// abstract. Without it only the identifier, the URL and the archive prefix are written.
pub fn bibtex_entry(id: &PaperId, entry: Option<&ArxivEntry>) -> String {
  let key = format!("arxiv:{}", id.to_string().replace('.', ""));
  let url = format!("https://arxiv.org/abs/{id}");

  let Some(entry) = entry else {
    return format!(
      "@article{{{key},\n  title={{arXiv:{id}}},\n  eprint={{{id}}},\n  url={{{url}}},\n  \
       archivePrefix={{arXiv}},\n  eprinttype={{arXiv}}\n}}\n"
    );
  };

  let mut fields = vec![
    ("title", escape(&entry.title)),
    ("author", entry.authors.join(" and ")),
    ("journal", format!("arXiv preprint arXiv:{id}")),
  ];
  if let Some(published) = entry.published {
    fields.push(("year", published.format("%Y").to_string()));
    fields.push(("month", published.format("%-m").to_string()));
  }
  fields.push(("eprint", id.to_string()));
  if let Some(primary) = entry.categories.first() {
    fields.push(("primaryClass", primary.clone()));
  }
  fields.push(("url", url));
  fields.push(("archivePrefix", "arXiv".to_string()));
  fields.push(("eprinttype", "arXiv".to_string()));
  fields.push(("abstract", escape(entry.summary.trim())));

  let body =
    fields.iter().map(|(name, value)| format!("  {name}={{{value}}}")).collect::<Vec<_>>();
  format!("@article{{{key},\n{}\n}}\n", body.join(",\n"))
}

/// Counters of an organize pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizeStats {
  /// Paper folders written
  pub papers:              u64,
  /// Versions unpacked under `tex/`
  pub versions_extracted:  u64,
  /// Archives that would not unpack
  pub extraction_failures: u64,
  /// Versions that were a PDF rather than an archive
  pub pdfs:                u64,
  /// `references.bib` files built from arXiv metadata
  pub bib_entries:         u64,
  /// `references.bib` files holding the stub entry
  pub bib_fallbacks:       u64,
  /// Archives whose name is not an arXiv identifier
  pub skipped:             u64,
}

/// Archives of one paper, keyed by version.
pub type PaperArchives = BTreeMap<u32, PathBuf>;

/// Turns a folder of `<id>vN.tar.gz` archives into per-paper folders with a BibTeX entry.
#[derive(Debug)]
pub struct OrganizePass {
  /// Source of the BibTeX fields
  arxiv: ArxivClient,
}

impl OrganizePass {
  /// Creates the pass with a client built from `config`.
  pub fn new(config: &Config) -> Result<Self> { Ok(Self { arxiv: ArxivClient::new(config)? }) }

  /// Replaces the arXiv client.
  pub fn with_client(mut self, arxiv: ArxivClient) -> Self {
    self.arxiv = arxiv;
    self
  }

  /// The `*.tar.gz` archives directly inside `sources_dir`, grouped by paper.
  ///
  /// An archive without a version suffix counts as version 1. Next to the papers comes the number
  /// of archives passed over because their name is not an identifier.
  pub fn find_papers(sources_dir: &Path) -> Result<(BTreeMap<PaperId, PaperArchives>, u64)> {
    let mut papers: BTreeMap<PaperId, PaperArchives> = BTreeMap::new();
    let mut skipped = 0;

    for entry in WalkDir::new(sources_dir).min_depth(1).max_depth(1).sort_by_file_name() {
      let entry = entry?;
      let name = entry.file_name().to_string_lossy().into_owned();
      let Some(stem) = name.strip_suffix(ARCHIVE_SUFFIX) else { continue };
      if !entry.file_type().is_file() {
        continue;
      }

      match PaperId::parse_versioned(stem) {
        Ok((id, version)) => {
          papers.entry(id).or_default().insert(version.unwrap_or(1), entry.into_path());
        },
        Err(_) => {
          warn!("Skipping {name}: not an arXiv identifier");
          skipped += 1;
        },
      }
    }
    Ok((papers, skipped))
  }

  /// Organizes every archive in `sources_dir` into `output_dir`.
  ///
  /// Papers are handled one after the other since each one costs an API request. Broken
  /// archives and failed lookups are counted, not returned.
  pub async fn run(&self, sources_dir: &Path, output_dir: &Path) -> Result<OrganizeStats> {
    let (papers, skipped) = Self::find_papers(sources_dir)?;
    info!("Found {} papers under {}", papers.len(), sources_dir.display());

    let mut stats = OrganizeStats { skipped, ..Default::default() };
    for (id, versions) in papers {
      let paper_dir = output_dir.join(id.folder_name());
      let tex_dir = paper_dir.join("tex");
      tokio::fs::create_dir_all(&tex_dir).await?;

      for (version, archive) in versions {
        let target = tex_dir.join(format!("v{version}"));
        let unpacked = tokio::task::spawn_blocking({
          let archive = archive.clone();
          move || unpack(&archive, &target)
        })
        .await
        .map_err(|e| HarvestError::WorkerLost(e.to_string()))?;

        match unpacked {
          Ok(ArchiveKind::Pdf) => {
            debug!(%id, version, "PDF only, nothing to unpack");
            stats.pdfs += 1;
          },
          Ok(_) => {
            trace!(%id, version, "Unpacked {}", archive.display());
            stats.versions_extracted += 1;
          },
          Err(e) => {
            warn!(%id, version, "Failed to unpack: {e}");
            stats.extraction_failures += 1;
          },
        }
      }

      let entry = match self.arxiv.fetch_entry(&id.to_string()).await {
        Ok(entry) => {
          stats.bib_entries += 1;
          Some(entry)
        },
        Err(e) => {
          warn!(%id, "Writing a stub citation, metadata lookup failed: {e}");
          stats.bib_fallbacks += 1;
          None
        },
      };
      tokio::fs::write(paper_dir.join(BIB_FILE), bibtex_entry(&id, entry.as_ref())).await?;
      stats.papers += 1;
      debug!(%id, "Organized into {}", paper_dir.display());
    }

    info!(
      "Organize pass done: {} papers, {} versions unpacked, {} stub citations",
      stats.papers, stats.versions_extracted, stats.bib_fallbacks
    );
    Ok(stats)
  }
}
