//! Semantic Scholar graph API client.
//!
//! Only one endpoint is used: the paper lookup by arXiv identifier, asking for each reference's
//! external ids. References that are not on arXiv are dropped; the rest are returned by their
//! versionless arXiv identifier.

use super::*;
use crate::config::Config;

/// Paper lookup endpoint.
pub const DEFAULT_API_URL: &str = "https://api.semanticscholar.org/graph/v1/paper";

lazy_static! {
  /// Version suffix on an arXiv identifier.
  static ref VERSION: Regex = Regex::new(r"v\d+$").unwrap();
}

/// A referenced paper that is on arXiv.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
  /// Versionless arXiv identifier (new or old style)
  pub arxiv_id:            String,
  /// Semantic Scholar's own paper id
  pub semantic_scholar_id: Option<String>,
}

/// Wire shape of the paper lookup.
#[derive(Debug, Deserialize)]
struct PaperResponse {
  /// Referenced papers; the list and its entries may be null
  #[serde(default)]
  references: Option<Vec<Option<ReferenceResponse>>>,
}

/// Wire shape of one reference.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReferenceResponse {
  /// Semantic Scholar paper id
  paper_id:     Option<String>,
  /// Ids in other catalogues, keyed by catalogue name
  #[serde(default)]
  external_ids: Option<HashMap<String, serde_json::Value>>,
}

/// Extracts the arXiv references from a paper lookup response, deduplicated in listed order.
pub fn parse_references(body: &str) -> Result<Vec<Reference>> {
  let response: PaperResponse = serde_json::from_str(body)?;
  let mut seen = Vec::new();
  let mut references = Vec::new();

  for reference in response.references.into_iter().flatten().flatten() {
    let Some(arxiv) = reference
      .external_ids
      .as_ref()
      .and_then(|ids| ids.get("ArXiv"))
      .and_then(|value| value.as_str())
    else {
      continue;
    };
    let arxiv_id = VERSION.replace(arxiv.trim(), "").into_owned();
    if arxiv_id.is_empty() || seen.contains(&arxiv_id) {
      continue;
    }
    seen.push(arxiv_id.clone());
    references.push(Reference { arxiv_id, semantic_scholar_id: reference.paper_id });
  }
  Ok(references)
}

/// HTTP client for the Semantic Scholar graph API.
#[derive(Debug, Clone)]
pub struct SemanticScholarClient {
  /// Shared connection pool
  client:  reqwest::Client,
  /// Pause after every request
  delay:   Duration,
  /// Paper lookup endpoint
  api_url: String,
}

impl SemanticScholarClient {
  /// Builds a client with the user agent, timeout and delay from `config`.
  pub fn new(config: &Config) -> Result<Self> {
    let client = reqwest::Client::builder()
      .user_agent(&config.user_agent)
      .timeout(config.request_timeout())
      .build()?;
    Ok(Self { client, delay: config.semantic_delay(), api_url: DEFAULT_API_URL.to_string() })
  }

  /// Points the client at a different endpoint.
  pub fn with_endpoint(mut self, api_url: impl Into<String>) -> Self {
    self.api_url = api_url.into();
    self
  }

  /// Lists the arXiv papers `id` cites.
  ///
  /// # Errors
  ///
  /// - [`HarvestError::RateLimited`] on HTTP 429
  /// - [`HarvestError::NotFound`] when Semantic Scholar does not know the paper
  /// - [`HarvestError::ApiError`] for any other unsuccessful status
  pub async fn references(&self, id: &PaperId) -> Result<Vec<Reference>> {
    let url = format!("{}/arXiv:{id}", self.api_url);
    debug!("Querying Semantic Scholar for {id}");
    let response = self
      .client
      .get(&url)
      .query(&[("fields", "references,references.externalIds")])
      .send()
      .await;
    if !self.delay.is_zero() {
      tokio::time::sleep(self.delay).await;
    }

    let response = response?;
    match response.status() {
      status if status.is_success() => {},
      reqwest::StatusCode::TOO_MANY_REQUESTS =>
        return Err(HarvestError::RateLimited(id.to_string())),
      reqwest::StatusCode::NOT_FOUND => return Err(HarvestError::NotFound(id.to_string())),
      status =>
        return Err(HarvestError::ApiError(format!("Semantic Scholar answered {status} for {id}"))),
    }

    let references = parse_references(&response.text().await?)?;
    trace!("{id} cites {} arXiv papers", references.len());
    Ok(references)
  }
}
