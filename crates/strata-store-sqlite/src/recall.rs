//! Tiered keyword recall.
//!
//! Tiers are tried in a fixed order. Each either produces rows or signals
//! which kind of fallback it needs; any other failure is returned with the
//! tier named in the error.

use rusqlite::{Connection, params};
use strata_core::{
  edge::Edge,
  recall::{DEFAULT_RECALL_LIMIT, MatchMode, RecallHit, RecallOptions},
};
use tracing::debug;

use crate::{
  Error, Result,
  encode::{RawEdge, RawHit},
  error::StepContext as _,
};

// ─── Tiers ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
  FullText,
  FullTextDecisions,
  Substring,
  SubstringDecisions,
}

const TIERS: [Tier; 4] = [
  Tier::FullText,
  Tier::FullTextDecisions,
  Tier::Substring,
  Tier::SubstringDecisions,
];

/// Why a tier handed over to the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fallback {
  /// The full-text engine rejected the query text.
  Syntax,
  /// The schema predates the pattern tables.
  Legacy,
}

enum TierOutcome {
  Rows(Vec<RawHit>),
  Next(Fallback),
}

impl Tier {
  fn step(self) -> &'static str {
    match self {
      Self::FullText => "recall full-text",
      Self::FullTextDecisions => "recall full-text (decisions only)",
      Self::Substring => "recall substring",
      Self::SubstringDecisions => "recall substring (decisions only)",
    }
  }

  fn mode(self) -> MatchMode {
    match self {
      Self::FullText | Self::FullTextDecisions => MatchMode::FullText,
      Self::Substring | Self::SubstringDecisions => MatchMode::Substring,
    }
  }

  /// Whether this tier runs given the fallbacks seen so far.
  fn applies(self, legacy: bool, syntax: bool) -> bool {
    match self {
      Self::FullText => true,
      Self::FullTextDecisions => legacy && !syntax,
      Self::Substring => syntax && !legacy,
      Self::SubstringDecisions => legacy && syntax,
    }
  }

  fn sql(self) -> &'static str {
    match self {
      Self::FullText => FULL_TEXT_SQL,
      Self::FullTextDecisions => FULL_TEXT_DECISIONS_SQL,
      Self::Substring => SUBSTRING_SQL,
      Self::SubstringDecisions => SUBSTRING_DECISIONS_SQL,
    }
  }

  fn run(
    self,
    conn: &Connection,
    query: &str,
    limit: i64,
  ) -> Result<TierOutcome> {
    let param = match self.mode() {
      MatchMode::FullText => query.to_owned(),
      MatchMode::Substring => like_pattern(query),
    };
    let rows = conn.prepare(self.sql()).and_then(|mut stmt| {
      stmt
        .query_map(params![param, limit], RawHit::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()
    });
    match rows {
      Ok(rows) => Ok(TierOutcome::Rows(rows)),
      Err(e) => match classify(&e) {
        Some(fallback) => {
          debug!(
            tier = self.step(),
            ?fallback,
            error = %e,
            "recall tier fell through"
          );
          Ok(TierOutcome::Next(fallback))
        }
        None => Err(Error::Step { step: self.step(), source: e }),
      },
    }
  }
}

const FULL_TEXT_SQL: &str = "
SELECT search_index.entity_type,
       CAST(search_index.entity_id AS INTEGER),
       COALESCE(d.title, p.title),
       COALESCE(d.reasoning, p.description),
       COALESCE(d.confidence, p.confidence),
       COALESCE(d.created_at, p.created_at),
       e.summary,
       e.drift_status
FROM search_index
LEFT JOIN decisions d
       ON search_index.entity_type = 'decision'
      AND d.id = CAST(search_index.entity_id AS INTEGER)
LEFT JOIN patterns p
       ON search_index.entity_type = 'pattern'
      AND p.id = CAST(search_index.entity_id AS INTEGER)
LEFT JOIN evidence e
       ON e.entity_type = search_index.entity_type
      AND e.entity_id = CAST(search_index.entity_id AS INTEGER)
WHERE search_index MATCH ?1
  AND COALESCE(d.status, p.status) = 'active'
ORDER BY search_index.rank
LIMIT ?2";

const FULL_TEXT_DECISIONS_SQL: &str = "
SELECT 'decision', d.id, d.title, d.reasoning, d.confidence, d.created_at,
       e.summary, e.drift_status
FROM search_index
JOIN decisions d ON d.id = CAST(search_index.entity_id AS INTEGER)
LEFT JOIN evidence e ON e.entity_type = 'decision' AND e.entity_id = d.id
WHERE search_index MATCH ?1
  AND search_index.entity_type = 'decision'
  AND d.status = 'active'
ORDER BY search_index.rank
LIMIT ?2";

const SUBSTRING_SQL: &str = r"
SELECT kind, id, title, body, confidence, created_at, summary, drift_status
FROM (
  SELECT 'decision' AS kind, d.id AS id, d.title AS title, d.reasoning AS body,
         d.confidence AS confidence, d.created_at AS created_at,
         e.summary AS summary, e.drift_status AS drift_status
  FROM decisions d
  LEFT JOIN evidence e ON e.entity_type = 'decision' AND e.entity_id = d.id
  WHERE d.status = 'active'
    AND (d.title LIKE ?1 ESCAPE '\' OR d.reasoning LIKE ?1 ESCAPE '\'
         OR e.summary LIKE ?1 ESCAPE '\')
  UNION ALL
  SELECT 'pattern', p.id, p.title, p.description,
         p.confidence, p.created_at,
         e.summary, e.drift_status
  FROM patterns p
  LEFT JOIN evidence e ON e.entity_type = 'pattern' AND e.entity_id = p.id
  WHERE p.status = 'active'
    AND (p.title LIKE ?1 ESCAPE '\' OR p.description LIKE ?1 ESCAPE '\'
         OR e.summary LIKE ?1 ESCAPE '\')
)
ORDER BY created_at DESC, id DESC
LIMIT ?2";

const SUBSTRING_DECISIONS_SQL: &str = r"
SELECT 'decision', d.id, d.title, d.reasoning, d.confidence, d.created_at,
       e.summary, e.drift_status
FROM decisions d
LEFT JOIN evidence e ON e.entity_type = 'decision' AND e.entity_id = d.id
WHERE d.status = 'active'
  AND (d.title LIKE ?1 ESCAPE '\' OR d.reasoning LIKE ?1 ESCAPE '\'
       OR e.summary LIKE ?1 ESCAPE '\')
ORDER BY d.created_at DESC, d.id DESC
LIMIT ?2";

/// Decide whether a query failure should fall through to a later tier.
fn classify(err: &rusqlite::Error) -> Option<Fallback> {
  let msg = err.to_string().to_lowercase();
  if msg.contains("no such table: patterns") {
    return Some(Fallback::Legacy);
  }
  if let Some((_, column)) = msg.split_once("no such column: ") {
    // `x.y` means the SQL referenced a column the old schema lacks; a bare
    // name comes from an FTS5 column filter in the query text.
    return Some(if column.contains('.') {
      Fallback::Legacy
    } else {
      Fallback::Syntax
    });
  }
  if msg.contains("fts5:")
    || msg.contains("syntax error")
    || msg.contains("unterminated string")
  {
    return Some(Fallback::Syntax);
  }
  None
}

/// `%query%` with LIKE metacharacters escaped.
fn like_pattern(query: &str) -> String {
  let mut out = String::with_capacity(query.len() + 2);
  out.push('%');
  for c in query.chars() {
    if matches!(c, '\\' | '%' | '_') {
      out.push('\\');
    }
    out.push(c);
  }
  out.push('%');
  out
}

// ─── Entry point ─────────────────────────────────────────────────────────────

pub fn recall(
  conn: &Connection,
  query: &str,
  options: &RecallOptions,
) -> Result<Vec<RecallHit>> {
  let query = query.trim();
  if query.is_empty() {
    return Err(Error::InvalidQuery("recall query is empty".to_owned()));
  }
  let limit = match options.limit {
    0 => DEFAULT_RECALL_LIMIT,
    n => n,
  };
  let limit = i64::try_from(limit).unwrap_or(i64::MAX);

  let (mut legacy, mut syntax) = (false, false);
  let mut found = None;
  for tier in TIERS {
    if !tier.applies(legacy, syntax) {
      continue;
    }
    match tier.run(conn, query, limit)? {
      TierOutcome::Rows(rows) => {
        found = Some((tier, rows));
        break;
      }
      TierOutcome::Next(Fallback::Legacy) => legacy = true,
      TierOutcome::Next(Fallback::Syntax) => syntax = true,
    }
  }
  let Some((tier, rows)) = found else {
    return Err(Error::InvalidQuery(format!(
      "no recall strategy accepted {query:?}"
    )));
  };
  debug!(tier = tier.step(), rows = rows.len(), "recall matched");

  let mut hits = Vec::with_capacity(rows.len());
  for raw in rows {
    let mut hit = raw.into_hit(tier.mode())?;
    if options.kind.is_some_and(|kind| kind != hit.kind) {
      continue;
    }
    match edges_for(conn, &hit) {
      Ok(edges) => hit.edges = edges,
      Err(e) => debug!(
        kind = %hit.kind,
        id = hit.id,
        error = %e,
        "edge enrichment skipped"
      ),
    }
    hits.push(hit);
  }
  Ok(hits)
}

fn edges_for(conn: &Connection, hit: &RecallHit) -> Result<Vec<Edge>> {
  let mut stmt = conn
    .prepare_cached(
      "SELECT from_type, from_id, to_type, to_ref, relation, source,
              confidence, created_at
       FROM edges
       WHERE from_type = ?1 AND from_id = ?2
       ORDER BY relation, to_type, to_ref",
    )
    .step("load edges")?;
  let raws = stmt
    .query_map(params![hit.kind.as_str(), hit.id], RawEdge::from_row)
    .step("load edges")?
    .collect::<rusqlite::Result<Vec<_>>>()
    .step("load edges")?;
  raws.into_iter().map(RawEdge::into_edge).collect()
}
