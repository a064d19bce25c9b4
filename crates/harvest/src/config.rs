//! Run configuration.
//!
//! A [`Config`] holds the knobs shared by every pass (output directory, pool width, failure
//! threshold, politeness delays) plus any number of named [`Profile`]s. A profile pins a range
//! and may override the output directory and pool width, which is how a single config file
//! describes several people splitting one month between them.
//!
//! ```toml
//! save_dir = "./papers"
//! max_parallels = 10
//! failure_threshold = 3
//!
//! [profiles.test]
//! start_month = "2023-05"
//! start_id = 4593
//! end_month = "2023-05"
//! end_id = 5092
//! save_dir = "./papers_test"
//! ```

use super::*;
use crate::scan::ScanOptions;

/// User agent sent to arXiv and Semantic Scholar.
pub const DEFAULT_USER_AGENT: &str = concat!("harvest/", env!("CARGO_PKG_VERSION"));

/// Shared settings for every pass, plus named ranges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Root of the per-paper output folders
  pub save_dir:              PathBuf,
  /// Attempts in flight for the sources and metadata passes
  pub max_parallels:         usize,
  /// In-order consecutive failures that end an open-ended month
  pub failure_threshold:     u32,
  /// Attempts in flight for the references pass
  pub semantic_parallels:    usize,
  /// Pause after every arXiv request, in milliseconds
  pub arxiv_delay_ms:        u64,
  /// Pause after every Semantic Scholar request, in milliseconds
  pub semantic_delay_ms:     u64,
  /// Wait before retrying an identifier Semantic Scholar rate limited, in seconds
  pub rate_limit_retry_secs: u64,
  /// HTTP request timeout, in seconds
  pub request_timeout_secs:  u64,
  /// User agent for every HTTP request
  pub user_agent:            String,
  /// Named ranges
  pub profiles:              BTreeMap<String, Profile>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      save_dir:              PathBuf::from("./papers"),
      max_parallels:         crate::scan::DEFAULT_CONCURRENCY,
      failure_threshold:     crate::scan::DEFAULT_FAILURE_THRESHOLD,
      semantic_parallels:    1,
      arxiv_delay_ms:        500,
      semantic_delay_ms:     3_000,
      rate_limit_retry_secs: 30,
      request_timeout_secs:  30,
      user_agent:            DEFAULT_USER_AGENT.to_string(),
      profiles:              BTreeMap::new(),
    }
  }
}

/// A named range with optional overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
  /// Month the range starts in
  pub start_month:   Month,
  /// First sequence number in the start month
  pub start_id:      u64,
  /// Month the range ends in
  pub end_month:     Month,
  /// Last sequence number in the end month
  pub end_id:        u64,
  /// Output directory for this profile
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub save_dir:      Option<PathBuf>,
  /// Pool width for this profile
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub max_parallels: Option<usize>,
}

impl Profile {
  /// Validates the profile's bounds into a [`RangeSpec`].
  pub fn range(&self) -> Result<RangeSpec> {
    RangeSpec::new(self.start_month, self.start_id, self.end_month, self.end_id)
  }
}

impl Config {
  /// `<config dir>/harvest/config.toml`, falling back to the working directory.
  pub fn default_path() -> PathBuf {
    dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join("harvest").join("config.toml")
  }

  /// Reads a config file. Missing keys take their defaults.
  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    debug!("Loading config from {}", path.display());
    let content = std::fs::read_to_string(path)?;
    let config: Self = toml::from_str(&content)?;
    config.scan_options()?;
    Ok(config)
  }

  /// Writes the config as TOML, creating parent directories as needed.
  pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(self)?)?;
    debug!("Saved config to {}", path.display());
    Ok(())
  }

  /// Default settings plus a few example profiles, as written by `harvest init`.
  pub fn example() -> Self {
    let profile = |start: (&str, u64), end: (&str, u64), dir: &str| -> Result<Profile> {
      Ok(Profile {
        start_month:   start.0.parse()?,
        start_id:      start.1,
        end_month:     end.0.parse()?,
        end_id:        end.1,
        save_dir:      Some(PathBuf::from(dir)),
        max_parallels: None,
      })
    };

    let mut config = Self::default();
    let examples = [
      ("test", profile(("2023-05", 4593), ("2023-05", 5092), "./papers_test")),
      ("april-tail", profile(("2023-04", 14607), ("2023-05", 4592), "./papers_april")),
    ];
    for (name, profile) in examples {
      if let Ok(profile) = profile {
        config.profiles.insert(name.to_string(), profile);
      }
    }
    config
  }

  /// Sets the output directory.
  pub fn with_save_dir(mut self, save_dir: impl AsRef<Path>) -> Self {
    self.save_dir = save_dir.as_ref().to_path_buf();
    self
  }

  /// Sets the pool width of the sources and metadata passes.
  pub fn with_max_parallels(mut self, max_parallels: usize) -> Self {
    self.max_parallels = max_parallels;
    self
  }

  /// Sets the failure threshold.
  pub fn with_failure_threshold(mut self, failure_threshold: u32) -> Self {
    self.failure_threshold = failure_threshold;
    self
  }

  /// Sets every politeness delay to zero. Meant for tests and local mirrors.
  pub fn without_delays(mut self) -> Self {
    self.arxiv_delay_ms = 0;
    self.semantic_delay_ms = 0;
    self.rate_limit_retry_secs = 0;
    self
  }

  /// Applies profile `name`: its overrides replace the shared settings, and its bounds become the
  /// returned range.
  pub fn for_profile(&self, name: &str) -> Result<(Self, RangeSpec)> {
    let profile = self.profiles.get(name).ok_or_else(|| {
      let known = self.profiles.keys().cloned().collect::<Vec<_>>().join(", ");
      HarvestError::Config(format!("unknown profile '{name}' (known: {known})"))
    })?;

    let mut config = self.clone();
    if let Some(save_dir) = &profile.save_dir {
      config.save_dir = save_dir.clone();
    }
    if let Some(max_parallels) = profile.max_parallels {
      config.max_parallels = max_parallels;
    }
    Ok((config, profile.range()?))
  }

  /// Scan options for the sources and metadata passes.
  pub fn scan_options(&self) -> Result<ScanOptions> {
    let options =
      ScanOptions { concurrency: self.max_parallels, failure_threshold: self.failure_threshold };
    options.validate()?;
    Ok(options)
  }

  /// Scan options for the references pass, which runs with its own, narrower pool.
  pub fn references_scan_options(&self) -> Result<ScanOptions> {
    let options = ScanOptions {
      concurrency:       self.semantic_parallels,
      failure_threshold: self.failure_threshold,
    };
    options.validate()?;
    Ok(options)
  }

  /// Pause after every arXiv request.
  pub fn arxiv_delay(&self) -> Duration { Duration::from_millis(self.arxiv_delay_ms) }

  /// Pause after every Semantic Scholar request.
  pub fn semantic_delay(&self) -> Duration { Duration::from_millis(self.semantic_delay_ms) }

  /// Wait before retrying rate limited identifiers.
  pub fn rate_limit_retry_delay(&self) -> Duration {
    Duration::from_secs(self.rate_limit_retry_secs)
  }

  /// HTTP request timeout.
  pub fn request_timeout(&self) -> Duration { Duration::from_secs(self.request_timeout_secs) }
}
