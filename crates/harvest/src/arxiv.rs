//! arXiv export API client.
//!
//! Metadata comes from the Atom feed at `export.arxiv.org/api/query`, source archives from the
//! `e-print` endpoint. arXiv asks bulk clients to pace their requests, so every request made
//! through an [`ArxivClient`] is followed by the configured delay.
//!
//! # Examples
//!
//! ```no_run
//! use harvest::{arxiv::ArxivClient, config::Config, identifier::PaperId};
//!
//! # async fn example() -> harvest::error::Result<()> {
//! let client = ArxivClient::new(&Config::default())?;
//! let entry = client.fetch_entry("2305.04592").await?;
//! println!("{} has {} versions", entry.title, entry.latest_version());
//!
//! let id: PaperId = "2305.04592".parse()?;
//! client.download_source(&id, 1, std::path::Path::new("2305.04592v1.tar.gz")).await?;
//! # Ok(())
//! # }
//! ```

use quick_xml::{events::Event, Reader};

use super::*;
use crate::config::Config;

/// Atom query endpoint.
pub const DEFAULT_API_URL: &str = "http://export.arxiv.org/api/query";

/// Source archive endpoint.
pub const DEFAULT_EPRINT_URL: &str = "https://arxiv.org/e-print";

lazy_static! {
  /// Trailing version suffix of an entry id URL.
  static ref VERSION_SUFFIX: Regex = Regex::new(r"v(\d+)$").unwrap();
}

/// One paper (or one version of a paper) as described by the Atom feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArxivEntry {
  /// Abstract page URL including the version, e.g. `http://arxiv.org/abs/2305.04592v2`
  pub entry_id:    String,
  /// Title with whitespace collapsed
  pub title:       String,
  /// Author names in listed order
  pub authors:     Vec<String>,
  /// Submission time of the first version
  pub published:   Option<DateTime<Utc>>,
  /// Submission time of this version
  pub updated:     Option<DateTime<Utc>>,
  /// Abstract
  pub summary:     String,
  /// Category terms, primary first
  pub categories:  Vec<String>,
  /// Journal reference, when the authors supplied one
  pub journal_ref: Option<String>,
  /// Link to the PDF
  pub pdf_url:     Option<String>,
}

impl ArxivEntry {
  /// Most recent version number, taken from the entry id. Defaults to 1.
  pub fn latest_version(&self) -> u32 {
    VERSION_SUFFIX
      .captures(&self.entry_id)
      .and_then(|caps| caps[1].parse().ok())
      .unwrap_or(1)
  }

  /// Whether this is the placeholder arXiv returns for malformed or unknown queries.
  fn is_error(&self) -> bool {
    self.entry_id.contains("/api/errors")
      || self.entry_id.is_empty()
      || (self.title.is_empty() && self.published.is_none())
  }
}

/// Parses an Atom feed into its entries.
pub fn parse_feed(xml: &str) -> Result<Vec<ArxivEntry>> {
  let mut reader = Reader::from_str(xml);
  reader.config_mut().trim_text(true);

  let mut entries = Vec::new();
  let mut current: Option<ArxivEntry> = None;
  let mut path: Vec<String> = Vec::new();

  loop {
    match reader.read_event()? {
      Event::Start(e) => {
        let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
        if name == "entry" {
          current = Some(ArxivEntry::default());
        }
        if let Some(entry) = current.as_mut() {
          apply_attributes(entry, &name, &e)?;
        }
        path.push(name);
      },
      Event::Empty(e) => {
        let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
        if let Some(entry) = current.as_mut() {
          apply_attributes(entry, &name, &e)?;
        }
      },
      Event::Text(e) => {
        let Some(entry) = current.as_mut() else { continue };
        let text = e.unescape()?;
        let parent = path.len().checked_sub(2).map(|i| path[i].as_str());
        match (parent, path.last().map(String::as_str)) {
          (Some("entry"), Some("id")) => entry.entry_id = text.trim().to_string(),
          (Some("entry"), Some("title")) => entry.title.push_str(&text),
          (Some("entry"), Some("summary")) => entry.summary.push_str(&text),
          (Some("entry"), Some("published")) => entry.published = parse_time(&text),
          (Some("entry"), Some("updated")) => entry.updated = parse_time(&text),
          (Some("entry"), Some("journal_ref")) => entry.journal_ref = Some(text.trim().to_string()),
          (Some("author"), Some("name")) => entry.authors.push(text.trim().to_string()),
          _ => {},
        }
      },
      Event::End(e) => {
        path.pop();
        if e.local_name().as_ref() == b"entry" {
          if let Some(mut entry) = current.take() {
            entry.title = entry.title.split_whitespace().collect::<Vec<_>>().join(" ");
            entry.summary = entry.summary.trim().to_string();
            entries.push(entry);
          }
        }
      },
      Event::Eof => break,
      _ => {},
    }
  }

  trace!("Parsed {} feed entries", entries.len());
  Ok(entries)
}

/// Picks up the attribute-carried fields: PDF link and category terms.
fn apply_attributes(
  entry: &mut ArxivEntry,
  name: &str,
  element: &quick_xml::events::BytesStart<'_>,
) -> Result<()> {
  let mut attributes = HashMap::new();
  for attribute in element.attributes().flatten() {
    let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
    attributes.insert(key, attribute.unescape_value()?.into_owned());
  }

  match name {
    "link" if attributes.get("title").map(String::as_str) == Some("pdf") =>
      entry.pdf_url = attributes.remove("href"),
    "category" | "primary_category" =>
      if let Some(term) = attributes.remove("term") {
        if !entry.categories.contains(&term) {
          entry.categories.push(term);
        }
      },
    _ => {},
  }
  Ok(())
}

/// Parses an RFC 3339 timestamp, as used throughout the feed.
fn parse_time(text: &str) -> Option<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(text.trim()).ok().map(|time| time.with_timezone(&Utc))
}

/// HTTP client for the arXiv API and e-print endpoints.
#[derive(Debug, Clone)]
pub struct ArxivClient {
  /// Shared connection pool
  client:     reqwest::Client,
  /// Pause after every request
  delay:      Duration,
  /// Atom query endpoint
  api_url:    String,
  /// Source archive endpoint
  eprint_url: String,
}

impl ArxivClient {
  /// Builds a client with the user agent, timeout and delay from `config`.
  pub fn new(config: &Config) -> Result<Self> {
    let client = reqwest::Client::builder()
      .user_agent(&config.user_agent)
      .timeout(config.request_timeout())
      .build()?;
    Ok(Self {
      client,
      delay: config.arxiv_delay(),
      api_url: DEFAULT_API_URL.to_string(),
      eprint_url: DEFAULT_EPRINT_URL.to_string(),
    })
  }

  /// Points the client at different endpoints, e.g. a mirror.
  pub fn with_endpoints(
    mut self,
    api_url: impl Into<String>,
    eprint_url: impl Into<String>,
  ) -> Self {
    self.api_url = api_url.into();
    self.eprint_url = eprint_url.into();
    self
  }

  /// Fetches the entry for `id`, which may carry a version suffix.
  ///
  /// # Errors
  ///
  /// [`HarvestError::NotFound`] when the feed holds no usable entry for `id`.
  pub async fn fetch_entry(&self, id: &str) -> Result<ArxivEntry> {
    debug!("Querying arXiv for {id}");
    let response = self.client.get(&self.api_url).query(&[("id_list", id)]).send().await;
    self.pause().await;

    let response = response?;
    if !response.status().is_success() {
      return Err(HarvestError::ApiError(format!("arXiv answered {} for {id}", response.status())));
    }
    let body = response.text().await?;

    parse_feed(&body)?
      .into_iter()
      .find(|entry| !entry.is_error())
      .ok_or_else(|| HarvestError::NotFound(id.to_string()))
  }

  /// Fetches the entry of one specific version.
  pub async fn fetch_version(&self, id: &PaperId, version: u32) -> Result<ArxivEntry> {
    self.fetch_entry(&id.versioned(version)).await
  }

  /// Downloads the source archive of one version to `dest`, returning its size in bytes.
  pub async fn download_source(&self, id: &PaperId, version: u32, dest: &Path) -> Result<u64> {
    let url = format!("{}/{}", self.eprint_url, id.versioned(version));
    debug!("Downloading {url}");
    let response = self.client.get(&url).send().await;
    self.pause().await;

    let response = response?;
    match response.status() {
      status if status.is_success() => {},
      reqwest::StatusCode::NOT_FOUND => return Err(HarvestError::NotFound(id.versioned(version))),
      status => return Err(HarvestError::ApiError(format!("e-print answered {status} for {url}"))),
    }

    let bytes = response.bytes().await?;
    if let Some(parent) = dest.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(dest, &bytes).await?;
    trace!("Wrote {} bytes to {}", bytes.len(), dest.display());
    Ok(bytes.len() as u64)
  }

  /// Sleeps for the configured politeness delay.
  async fn pause(&self) {
    if !self.delay.is_zero() {
      tokio::time::sleep(self.delay).await;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <title type="html">ArXiv Query: id_list=2305.04592</title>
  <id>http://arxiv.org/api/cHxbiOdZaP56ODnBPIenZhzg5f8</id>
  <updated>2023-06-01T00:00:00-04:00</updated>
  <entry>
    <id>http://arxiv.org/abs/2305.04592v3</id>
    <updated>2023-07-11T09:30:00Z</updated>
    <published>2023-05-08T10:00:00Z</published>
    <title>Sparse   Attention
      for Long Documents</title>
    <summary>  We study sparse attention &amp; its limits.
</summary>
    <author>
      <name>Ada Lovelace</name>
    </author>
    <author>
      <name>Alan Turing</name>
      <arxiv:affiliation>Bletchley Park</arxiv:affiliation>
    </author>
    <arxiv:journal_ref>J. Sparse Models 12 (2023)</arxiv:journal_ref>
    <link href="http://arxiv.org/abs/2305.04592v3" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/2305.04592v3" rel="related"
      type="application/pdf"/>
    <arxiv:primary_category term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
</feed>"#;

  const ERROR_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <id>http://arxiv.org/api/errors#incorrect_id_format_for_2305.999999</id>
    <title>Error</title>
    <summary>incorrect id format for 2305.999999</summary>
  </entry>
</feed>"#;

  #[test]
  fn test_parse_feed() {
    let entries = parse_feed(FEED).unwrap();
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];

    assert_eq!(entry.entry_id, "http://arxiv.org/abs/2305.04592v3");
    assert_eq!(entry.latest_version(), 3);
    assert_eq!(entry.title, "Sparse Attention for Long Documents");
    assert_eq!(entry.summary, "We study sparse attention & its limits.");
    assert_eq!(entry.authors, vec!["Ada Lovelace", "Alan Turing"]);
    assert_eq!(entry.categories, vec!["cs.CL", "cs.LG"]);
    assert_eq!(entry.journal_ref.as_deref(), Some("J. Sparse Models 12 (2023)"));
    assert_eq!(entry.pdf_url.as_deref(), Some("http://arxiv.org/pdf/2305.04592v3"));
    assert_eq!(entry.published.unwrap().format("%Y-%m-%d").to_string(), "2023-05-08");
    assert_eq!(entry.updated.unwrap().format("%Y-%m-%d").to_string(), "2023-07-11");
  }

  #[test]
  fn test_error_entries_are_flagged() {
    let entries = parse_feed(ERROR_FEED).unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].is_error());
  }

  #[test]
  fn test_latest_version_defaults_to_one() {
    let entry =
      ArxivEntry { entry_id: "http://arxiv.org/abs/2305.04592".into(), ..Default::default() };
    assert_eq!(entry.latest_version(), 1);
  }

  #[test]
  fn test_empty_feed() {
    assert!(parse_feed(r#"<feed xmlns="http://www.w3.org/2005/Atom"></feed>"#).unwrap().is_empty());
  }
}
