//! Error types for `filings-core`.
//!
//! Every variant is batch-fatal: the pipeline rolls back the whole batch and
//! reports the offending record. Ratio gaps are not errors; see
//! [`crate::ratio::RatioWarning`].

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A natural key is empty or malformed, or a reference cannot be resolved.
  #[error("integrity error: {0}")]
  Integrity(String),

  /// Strict insert mode found an existing fact for the same key.
  #[error(
    "duplicate fact for report {rcept_no:?}, statement {sj_div:?}, account {account_nm:?}"
  )]
  DuplicateFact {
    rcept_no:   String,
    sj_div:     String,
    account_nm: String,
  },

  /// A field value is outside its accepted domain (currency, amount, year).
  #[error("validation error: {0}")]
  Validation(String),

  /// The batch ran past its configured deadline.
  #[error("batch exceeded its timeout of {0:?}")]
  Timeout(Duration),

  /// The input document could not be decoded into raw records.
  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub fn integrity(msg: impl Into<String>) -> Self { Self::Integrity(msg.into()) }

  pub fn validation(msg: impl Into<String>) -> Self { Self::Validation(msg.into()) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
