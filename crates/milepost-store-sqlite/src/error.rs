//! Error type for `milepost-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("stored value decode error: {0}")]
  Decode(String),

  /// A dynamic table name that is not a bare `[A-Za-z0-9_]+` identifier.
  #[error("invalid table name: {0:?}")]
  InvalidIdentifier(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
