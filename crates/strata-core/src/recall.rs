//! Query and result types for keyword recall.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  claim::{ClaimKind, Confidence, DriftStatus},
  edge::Edge,
};

pub const DEFAULT_RECALL_LIMIT: usize = 10;

/// Parameters for [`crate::store::KnowledgeStore::recall`].
#[derive(Debug, Clone)]
pub struct RecallOptions {
  /// Maximum rows fetched from the index, before the kind filter.
  pub limit: usize,
  /// Keep only hits of this kind.
  pub kind:  Option<ClaimKind>,
}

impl Default for RecallOptions {
  fn default() -> Self { Self { limit: DEFAULT_RECALL_LIMIT, kind: None } }
}

/// Which retrieval strategy produced a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
  FullText,
  Substring,
}

/// One recalled claim with its outgoing edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecallHit {
  pub kind:             ClaimKind,
  pub id:               i64,
  pub title:            String,
  pub body:             String,
  pub confidence:       Confidence,
  pub evidence_summary: Option<String>,
  pub drift_status:     Option<DriftStatus>,
  pub created_at:       DateTime<Utc>,
  pub matched_by:       MatchMode,
  pub edges:            Vec<Edge>,
}
