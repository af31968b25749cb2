//! Error type for `strata-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] strata_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  /// A query or write failed; `step` names what was being attempted.
  #[error("{step}: {source}")]
  Step {
    step:   &'static str,
    #[source]
    source: rusqlite::Error,
  },

  #[error("migration {version} ({name}): {source}")]
  Migration {
    version: u32,
    name:    &'static str,
    #[source]
    source:  rusqlite::Error,
  },

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// A persisted timestamp is not valid RFC 3339. Never defaulted.
  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("{kind} {id} not found")]
  EntityNotFound { kind: &'static str, id: i64 },

  #[error("invalid query: {0}")]
  InvalidQuery(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Attach a step phrase to a raw SQLite result.
pub(crate) trait StepContext<T> {
  fn step(self, step: &'static str) -> Result<T>;
}

impl<T> StepContext<T> for rusqlite::Result<T> {
  fn step(self, step: &'static str) -> Result<T> {
    self.map_err(|source| Error::Step { step, source })
  }
}
