//! Generic directed relations from a claim to a code entity or another
//! claim.
//!
//! `to_ref` is a path for packages and files and `"<package>.<symbol>"` for
//! symbols. For claim targets it is the decimal entity id.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  claim::{ClaimKind, Confidence},
};

/// What an edge points at.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
  Package,
  File,
  Symbol,
  Decision,
  Pattern,
}

impl TargetType {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Package => "package",
      Self::File => "file",
      Self::Symbol => "symbol",
      Self::Decision => "decision",
      Self::Pattern => "pattern",
    }
  }
}

impl fmt::Display for TargetType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for TargetType {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "package" => Ok(Self::Package),
      "file" => Ok(Self::File),
      "symbol" => Ok(Self::Symbol),
      "decision" => Ok(Self::Decision),
      "pattern" => Ok(Self::Pattern),
      other => Err(Error::UnknownVariant {
        kind:  "edge target type",
        value: other.to_owned(),
      }),
    }
  }
}

/// Who created an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeSource {
  Auto,
  Manual,
}

impl EdgeSource {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Auto => "auto",
      Self::Manual => "manual",
    }
  }
}

impl FromStr for EdgeSource {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "auto" => Ok(Self::Auto),
      "manual" => Ok(Self::Manual),
      other => Err(Error::UnknownVariant {
        kind:  "edge source",
        value: other.to_owned(),
      }),
    }
  }
}

/// A persisted edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
  pub from_type:  ClaimKind,
  pub from_id:    i64,
  pub to_type:    TargetType,
  pub to_ref:     String,
  pub relation:   String,
  pub source:     EdgeSource,
  pub confidence: Confidence,
  pub created_at: DateTime<Utc>,
}

/// An edge proposed by the auto-linker; the owner is filled in on insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCandidate {
  pub to_type:    TargetType,
  pub to_ref:     String,
  pub relation:   &'static str,
  pub confidence: Confidence,
}

/// Input to [`crate::store::KnowledgeStore::link`].
#[derive(Debug, Clone)]
pub struct NewEdge {
  pub from_type:  ClaimKind,
  pub from_id:    i64,
  pub to_type:    TargetType,
  pub to_ref:     String,
  pub relation:   String,
  pub confidence: Confidence,
}
