//! Error type for `filings-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A batch-fatal pipeline error (integrity, duplicate, validation, timeout).
  #[error(transparent)]
  Core(#[from] filings_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("decimal parse error: {0}")]
  Decimal(String),

  /// A stored column holds a value outside its encoding.
  #[error("column decode error: {0}")]
  Decode(String),
}

impl Error {
  /// The pipeline error behind this failure, if any.
  pub fn as_core(&self) -> Option<&filings_core::Error> {
    match self {
      Self::Core(e) => Some(e),
      _ => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
