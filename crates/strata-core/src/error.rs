//! Error types for `strata-core`.

use thiserror::Error;

use crate::probe::ProbeError;

#[derive(Debug, Error)]
pub enum Error {
  /// A required field of a proposed claim was blank or absent.
  #[error("missing required field: {0}")]
  MissingField(&'static str),

  #[error("invalid check spec: {0}")]
  InvalidCheck(String),

  #[error("unknown {kind}: {value:?}")]
  UnknownVariant { kind: &'static str, value: String },

  /// A repository collaborator failed while performing `step`.
  #[error("{step}: {source}")]
  Probe {
    step:   &'static str,
    #[source]
    source: ProbeError,
  },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
