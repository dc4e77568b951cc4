use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
  #[error("metadata sidecar error: {0}")]
  Metadata(#[from] serde_json::Error),
  #[error("no such object: {0:?}")]
  NotFound(String),
  #[error("invalid object name: {0:?}")]
  InvalidName(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
