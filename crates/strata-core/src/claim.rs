//! Claim types — decisions and patterns recorded against a repository.
//!
//! A claim is only ever stored as `active` after its automated check passes.
//! Failed proposals leave a pending proposal and its evidence behind, never
//! an entity row.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result, check::CheckDescriptor};

// ─── Enumerations ────────────────────────────────────────────────────────────

/// The two kinds of claim a caller can propose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimKind {
  Decision,
  Pattern,
}

impl ClaimKind {
  /// The `entity_type` string used in evidence, edges and the search index.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Decision => "decision",
      Self::Pattern => "pattern",
    }
  }
}

impl fmt::Display for ClaimKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ClaimKind {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "decision" => Ok(Self::Decision),
      "pattern" => Ok(Self::Pattern),
      other => Err(Error::UnknownVariant {
        kind:  "claim kind",
        value: other.to_owned(),
      }),
    }
  }
}

/// How sure the author is about a claim.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
  Low,
  #[default]
  Medium,
  High,
}

impl Confidence {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Low => "low",
      Self::Medium => "medium",
      Self::High => "high",
    }
  }

  /// Parse caller input, treating a blank string as the default (`medium`).
  pub fn parse_or_default(s: &str) -> Result<Self> {
    let s = s.trim();
    if s.is_empty() {
      return Ok(Self::default());
    }
    s.parse()
  }
}

impl fmt::Display for Confidence {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Confidence {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "low" => Ok(Self::Low),
      "medium" => Ok(Self::Medium),
      "high" => Ok(Self::High),
      other => Err(Error::UnknownVariant {
        kind:  "confidence",
        value: other.to_owned(),
      }),
    }
  }
}

/// Lifecycle status of a stored claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
  Pending,
  Active,
  Archived,
}

impl ClaimStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Active => "active",
      Self::Archived => "archived",
    }
  }
}

/// Whether a claim's evidence still matches the live repository. Computed
/// by an external drift checker; read-only here.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DriftStatus {
  Ok,
  Drifting,
  #[default]
  Unknown,
}

impl DriftStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Ok => "ok",
      Self::Drifting => "drifting",
      Self::Unknown => "unknown",
    }
  }
}

impl FromStr for DriftStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "ok" => Ok(Self::Ok),
      "drifting" => Ok(Self::Drifting),
      "unknown" => Ok(Self::Unknown),
      other => Err(Error::UnknownVariant {
        kind:  "drift status",
        value: other.to_owned(),
      }),
    }
  }
}

// ─── Proposals ───────────────────────────────────────────────────────────────

/// Input to [`crate::store::KnowledgeStore::propose`].
#[derive(Debug, Clone)]
pub struct NewClaim {
  pub kind:       ClaimKind,
  pub title:      String,
  /// Reasoning for a decision, description for a pattern.
  pub body:       String,
  /// Example snippet; only stored for patterns.
  pub example:    Option<String>,
  pub confidence: Confidence,
  /// Caller-supplied justification text. Required.
  pub evidence:   String,
  pub check:      CheckDescriptor,
}

impl NewClaim {
  /// Convenience constructor with confidence and example defaulted.
  pub fn new(
    kind: ClaimKind,
    title: impl Into<String>,
    body: impl Into<String>,
    evidence: impl Into<String>,
    check: CheckDescriptor,
  ) -> Self {
    Self {
      kind,
      title: title.into(),
      body: body.into(),
      example: None,
      confidence: Confidence::default(),
      evidence: evidence.into(),
      check,
    }
  }

  /// Reject a claim whose required fields are blank, and resolve its check.
  ///
  /// Runs before any database work so that nothing is persisted for an
  /// invalid proposal.
  pub fn validate(&self) -> Result<crate::check::Check> {
    if self.title.trim().is_empty() {
      return Err(Error::MissingField("title"));
    }
    if self.evidence.trim().is_empty() {
      return Err(Error::MissingField("evidence summary"));
    }
    self.check.resolve()
  }

  /// The text the auto-linker scans for package, file and symbol mentions.
  pub fn link_text(&self) -> String { format!("{} {}", self.title, self.body) }
}

/// Outcome of proposing a claim.
///
/// A failed check is not an error: `promoted` is `false` and
/// `verification_details` says what was checked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionResult {
  pub promoted:             bool,
  pub proposal_id:          i64,
  /// Set only when the claim was promoted.
  pub entity_id:            Option<i64>,
  pub verification_passed:  bool,
  pub verification_details: String,
  /// Number of edges the auto-linker recorded for the new entity.
  pub linked_edges:         usize,
}
