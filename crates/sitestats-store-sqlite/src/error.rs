//! Error type for `sitestats-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Domain errors: validation failures, missing owners, bad payloads.
  #[error("core error: {0}")]
  Core(#[from] sitestats_core::Error),

  #[error("database error: {0}")]
  Database(tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// Timestamps are stored as four-digit-year text.
  #[error("timestamp outside years 0000-9999: {0}")]
  DateOutOfRange(chrono::DateTime<chrono::Utc>),
}

impl Error {
  /// The wrapped domain error, if this is one.
  pub fn domain(&self) -> Option<&sitestats_core::Error> {
    match self {
      Self::Core(e) => Some(e),
      _ => None,
    }
  }
}

/// Domain errors raised inside a connection closure travel back boxed in
/// [`tokio_rusqlite::Error::Other`]; unwrap them here so callers can match on
/// [`Error::Core`].
impl From<tokio_rusqlite::Error> for Error {
  fn from(err: tokio_rusqlite::Error) -> Self {
    match err {
      tokio_rusqlite::Error::Other(boxed) => {
        match boxed.downcast::<sitestats_core::Error>() {
          Ok(core) => Self::Core(*core),
          Err(other) => Self::Database(tokio_rusqlite::Error::Other(other)),
        }
      }
      other => Self::Database(other),
    }
  }
}

/// Box a domain error for return from inside a connection closure.
pub(crate) fn domain(err: sitestats_core::Error) -> tokio_rusqlite::Error {
  tokio_rusqlite::Error::Other(Box::new(err))
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
