//! Error types for the harvest CLI.

use harvest::error::HarvestError;
use thiserror::Error;

/// Error type alias used for the CLI.
pub type Result<T> = core::result::Result<T, HarvestdError>;

/// Errors that can end a CLI invocation.
#[derive(Error, Debug)]
pub enum HarvestdError {
  /// Errors from the harvest library, mostly configuration and range validation.
  #[error(transparent)]
  Harvest(#[from] HarvestError),

  /// Filesystem errors outside the library.
  #[error(transparent)]
  Io(#[from] std::io::Error),

  /// Arguments that parse but do not describe a usable run.
  #[error("{0}")]
  Usage(String),
}
