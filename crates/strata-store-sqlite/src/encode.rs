//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 UTC strings with fixed microsecond
//! precision, so lexical order is chronological order. Enumerations are
//! stored as their lowercase names.

use chrono::{DateTime, SecondsFormat, Utc};
use strata_core::{
  claim::{ClaimKind, Confidence, DriftStatus},
  edge::{Edge, EdgeSource, TargetType},
  orient::{DecisionSummary, Knowledge, PatternSummary},
  recall::{MatchMode, RecallHit},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw columns of a recall hit before enrichment.
pub struct RawHit {
  pub kind:             String,
  pub id:               i64,
  pub title:            String,
  pub body:             String,
  pub confidence:       String,
  pub created_at:       String,
  pub evidence_summary: Option<String>,
  pub drift_status:     Option<String>,
}

impl RawHit {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      kind:             row.get(0)?,
      id:               row.get(1)?,
      title:            row.get(2)?,
      body:             row.get(3)?,
      confidence:       row.get(4)?,
      created_at:       row.get(5)?,
      evidence_summary: row.get(6)?,
      drift_status:     row.get(7)?,
    })
  }

  pub fn into_hit(self, matched_by: MatchMode) -> Result<RecallHit> {
    Ok(RecallHit {
      kind: self.kind.parse::<ClaimKind>()?,
      id: self.id,
      title: self.title,
      body: self.body,
      confidence: self.confidence.parse::<Confidence>()?,
      evidence_summary: self.evidence_summary,
      drift_status: self
        .drift_status
        .as_deref()
        .map(str::parse::<DriftStatus>)
        .transpose()?,
      created_at: decode_dt(&self.created_at)?,
      matched_by,
      edges: Vec::new(),
    })
  }
}

/// Raw strings read from an `edges` row.
pub struct RawEdge {
  pub from_type:  String,
  pub from_id:    i64,
  pub to_type:    String,
  pub to_ref:     String,
  pub relation:   String,
  pub source:     String,
  pub confidence: String,
  pub created_at: String,
}

impl RawEdge {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      from_type:  row.get(0)?,
      from_id:    row.get(1)?,
      to_type:    row.get(2)?,
      to_ref:     row.get(3)?,
      relation:   row.get(4)?,
      source:     row.get(5)?,
      confidence: row.get(6)?,
      created_at: row.get(7)?,
    })
  }

  pub fn into_edge(self) -> Result<Edge> {
    Ok(Edge {
      from_type:  self.from_type.parse::<ClaimKind>()?,
      from_id:    self.from_id,
      to_type:    self.to_type.parse::<TargetType>()?,
      to_ref:     self.to_ref,
      relation:   self.relation,
      source:     self.source.parse::<EdgeSource>()?,
      confidence: self.confidence.parse::<Confidence>()?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// A claim linked to a package, joined with the owning claim.
pub struct RawKnowledge {
  pub kind:            String,
  pub id:              i64,
  pub relation:        String,
  pub edge_confidence: String,
  pub title:           String,
  pub confidence:      String,
}

impl RawKnowledge {
  pub fn into_knowledge(self) -> Result<Knowledge> {
    Ok(Knowledge {
      kind:            self.kind.parse::<ClaimKind>()?,
      id:              self.id,
      title:           self.title,
      confidence:      self.confidence.parse::<Confidence>()?,
      relation:        self.relation,
      edge_confidence: self.edge_confidence.parse::<Confidence>()?,
    })
  }
}

/// An active decision or pattern joined with its evidence drift status.
pub struct RawClaimSummary {
  pub id:           i64,
  pub title:        String,
  pub body:         String,
  pub example:      Option<String>,
  pub confidence:   String,
  pub drift_status: Option<String>,
  pub updated_at:   String,
}

impl RawClaimSummary {
  fn drift(&self) -> Result<DriftStatus> {
    Ok(
      self
        .drift_status
        .as_deref()
        .map(str::parse::<DriftStatus>)
        .transpose()?
        .unwrap_or_default(),
    )
  }

  pub fn into_decision(self) -> Result<DecisionSummary> {
    let drift_status = self.drift()?;
    Ok(DecisionSummary {
      id: self.id,
      title: self.title,
      reasoning: self.body,
      confidence: self.confidence.parse::<Confidence>()?,
      drift_status,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }

  pub fn into_pattern(self) -> Result<PatternSummary> {
    let drift_status = self.drift()?;
    Ok(PatternSummary {
      id: self.id,
      title: self.title,
      description: self.body,
      example: self.example,
      confidence: self.confidence.parse::<Confidence>()?,
      drift_status,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}
