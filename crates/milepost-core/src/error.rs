//! Error types for `milepost-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("column {column:?}: cannot parse {value:?} as {expected}")]
  InvalidField {
    column:   &'static str,
    value:    String,
    expected: &'static str,
  },

  #[error("header row contains none of the expected source columns")]
  NoRecognizedColumns,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
