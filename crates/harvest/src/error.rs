//! Error types for the harvest library.
//!
//! Only a small part of this enum is ever seen by the range scanner itself. Per-paper failures
//! (network trouble, missing papers, broken archives) are converted into a failed
//! [`Outcome`](crate::scan::Outcome) at the task boundary, so the variants mostly surface from
//! the clients and from configuration handling:
//! - Network and API errors
//! - Identifier and range validation
//! - Archive extraction
//! - Configuration and filesystem access
//!
//! # Examples
//!
//! ```
//! use harvest::{error::HarvestError, identifier::Month};
//!
//! match "2023-13".parse::<Month>() {
//!   Err(HarvestError::InvalidMonth(raw)) => println!("bad month: {raw}"),
//!   Err(e) => println!("other error: {e}"),
//!   Ok(month) => println!("parsed {month}"),
//! }
//! ```

use thiserror::Error;

/// Error type alias used for the [`harvest`](crate) crate.
pub type Result<T> = core::result::Result<T, HarvestError>;

/// Errors that can occur while harvesting papers.
///
/// Of these, only the configuration class ([`HarvestError::InvalidMonth`],
/// [`HarvestError::InvalidIdentifier`], [`HarvestError::InvalidRange`] and
/// [`HarvestError::Config`]) is allowed to abort a whole run, and it is always raised before the
/// first phase starts.
#[derive(Error, Debug)]
pub enum HarvestError {
  /// A month bucket was not in `YYYY-MM` form or named a month outside 1..=12.
  #[error("Invalid month \"{0}\", expected YYYY-MM")]
  InvalidMonth(String),

  /// A paper identifier could not be parsed.
  ///
  /// Accepted shapes are `YYMM.NNNNN` (or `YYMM.NNNN` before 2015), optionally followed by a
  /// `vN` version suffix.
  #[error("Invalid identifier \"{0}\"")]
  InvalidIdentifier(String),

  /// The requested range can not be scanned.
  ///
  /// This occurs when:
  /// - The end month is before the start month
  /// - Both bounds are in the same month and the end id is before the start id
  /// - The two months are neither the same nor adjacent
  /// - An id is zero or does not fit the month's sequence width
  #[error("Invalid range: {0}")]
  InvalidRange(String),

  /// A network request failed.
  #[error(transparent)]
  Network(#[from] reqwest::Error),

  /// The requested paper (or version) does not exist upstream.
  #[error("Paper not found: {0}")]
  NotFound(String),

  /// An API answered with an unexpected status or body.
  #[error("API error: {0}")]
  ApiError(String),

  /// The citation API answered with HTTP 429.
  ///
  /// Rate-limited identifiers are queued by the references task and retried after the scan.
  #[error("Rate limited while fetching {0}")]
  RateLimited(String),

  /// An arXiv Atom feed could not be parsed.
  #[error(transparent)]
  Xml(#[from] quick_xml::Error),

  /// A JSON document could not be read or written.
  #[error(transparent)]
  Json(#[from] serde_json::Error),

  /// A source archive could not be unpacked.
  #[error("Extraction failed for {0}")]
  Extraction(String),

  /// A file system operation failed.
  #[error(transparent)]
  Path(#[from] std::io::Error),

  /// A directory walk failed.
  #[error(transparent)]
  Walk(#[from] walkdir::Error),

  /// A worker task disappeared without reporting its result.
  ///
  /// This only happens when the runtime is shutting down underneath a scan.
  #[error("Worker task was lost before reporting: {0}")]
  WorkerLost(String),

  /// A TOML configuration file could not be parsed.
  #[error(transparent)]
  TomlDe(#[from] toml::de::Error),

  /// A configuration could not be serialized.
  #[error(transparent)]
  TomlSer(#[from] toml::ser::Error),

  /// Any other configuration problem.
  #[error("{0}")]
  Config(String),
}
