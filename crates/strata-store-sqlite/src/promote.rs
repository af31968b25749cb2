//! The verify-then-promote pipeline, and manual edges.
//!
//! All writes for one proposal happen in a single transaction: a claim is
//! never visible as `active` to a concurrent reader before its evidence,
//! search-index row and auto-linked edges are durable.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _, Transaction, params};
use strata_core::{
  claim::{ClaimKind, ClaimStatus, NewClaim, PromotionResult},
  edge::{EdgeSource, LinkCandidate, NewEdge},
  link::{AutoLinker, KnownSymbol},
};
use tracing::{debug, info};

use crate::{
  Error, Result,
  encode::encode_dt,
  error::StepContext as _,
  tx::in_transaction,
  verify,
};

/// Per-kind table and step names.
struct KindSql {
  table:         &'static str,
  insert_step:   &'static str,
  evidence_step: &'static str,
  commit_step:   &'static str,
}

fn kind_sql(kind: ClaimKind) -> KindSql {
  match kind {
    ClaimKind::Decision => KindSql {
      table:         "decisions",
      insert_step:   "insert decision",
      evidence_step: "insert decision evidence",
      commit_step:   "commit decision tx",
    },
    ClaimKind::Pattern => KindSql {
      table:         "patterns",
      insert_step:   "insert pattern",
      evidence_step: "insert pattern evidence",
      commit_step:   "commit pattern tx",
    },
  }
}

/// Validate, verify and (on success) promote one claim.
///
/// Validation, check compilation and spec serialization all happen before
/// the transaction opens, so nothing is persisted for malformed input.
pub fn propose(
  conn: &mut Connection,
  claim: &NewClaim,
  root: &Path,
  now: DateTime<Utc>,
) -> Result<PromotionResult> {
  let check = claim.validate()?;
  let prepared = verify::prepare(&check)?;
  let check_spec = serde_json::to_string(&claim.check.spec)?;
  let sql = kind_sql(claim.kind);
  let now = encode_dt(now);

  let result = in_transaction(conn, sql.commit_step, |tx| {
    tx.execute(
      "INSERT INTO proposals (
         kind, title, body, example, confidence, evidence_summary,
         check_type, check_spec, status, created_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
      params![
        claim.kind.as_str(),
        claim.title,
        claim.body,
        claim.example,
        claim.confidence.as_str(),
        claim.evidence,
        check.discriminant(),
        check_spec,
        ClaimStatus::Pending.as_str(),
        now,
      ],
    )
    .step("insert proposal")?;
    let proposal_id = tx.last_insert_rowid();

    let outcome = verify::run(tx, root, &prepared)?;

    if !outcome.passed {
      tx.execute(
        "INSERT INTO evidence (entity_type, entity_id, proposal_id, summary)
         VALUES (?1, NULL, ?2, ?3)",
        params![claim.kind.as_str(), proposal_id, claim.evidence],
      )
      .step(sql.evidence_step)?;
      tx.execute(
        "UPDATE proposals SET verification_details = ?1 WHERE id = ?2",
        params![outcome.details, proposal_id],
      )
      .step("update proposal")?;

      return Ok(PromotionResult {
        promoted: false,
        proposal_id,
        entity_id: None,
        verification_passed: false,
        verification_details: outcome.details,
        linked_edges: 0,
      });
    }

    let entity_id = insert_entity(tx, claim, &sql, &now)?;

    tx.execute(
      "INSERT INTO evidence (entity_type, entity_id, proposal_id, summary)
       VALUES (?1, ?2, ?3, ?4)",
      params![claim.kind.as_str(), entity_id, proposal_id, claim.evidence],
    )
    .step(sql.evidence_step)?;

    tx.execute(
      "UPDATE proposals
       SET status = 'resolved', entity_id = ?1, verification_details = ?2,
           resolved_at = ?3
       WHERE id = ?4",
      params![entity_id, outcome.details, now, proposal_id],
    )
    .step("update proposal")?;

    tx.execute(
      "INSERT INTO search_index (title, content, entity_type, entity_id)
       VALUES (?1, ?2, ?3, ?4)",
      params![
        claim.title,
        search_content(claim),
        claim.kind.as_str(),
        entity_id
      ],
    )
    .step("insert search index")?;

    let linker = load_linker(tx)?;
    let candidates = linker.detect(&claim.link_text());
    let linked_edges =
      insert_candidates(tx, claim.kind, entity_id, &candidates, &now)?;

    Ok(PromotionResult {
      promoted: true,
      proposal_id,
      entity_id: Some(entity_id),
      verification_passed: true,
      verification_details: outcome.details,
      linked_edges,
    })
  })?;

  if result.promoted {
    info!(
      kind = %claim.kind,
      entity_id = ?result.entity_id,
      linked_edges = result.linked_edges,
      "claim promoted"
    );
  } else {
    info!(
      kind = %claim.kind,
      proposal_id = result.proposal_id,
      details = %result.verification_details,
      "claim left pending"
    );
  }
  Ok(result)
}

fn insert_entity(
  tx: &Transaction<'_>,
  claim: &NewClaim,
  sql: &KindSql,
  now: &str,
) -> Result<i64> {
  let active = ClaimStatus::Active.as_str();
  match claim.kind {
    ClaimKind::Decision => tx.execute(
      "INSERT INTO decisions (
         title, reasoning, confidence, status, created_at, updated_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
      params![claim.title, claim.body, claim.confidence.as_str(), active, now],
    ),
    ClaimKind::Pattern => tx.execute(
      "INSERT INTO patterns (
         title, description, example, confidence, status, created_at, updated_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
      params![
        claim.title,
        claim.body,
        claim.example,
        claim.confidence.as_str(),
        active,
        now
      ],
    ),
  }
  .step(sql.insert_step)?;
  let id = tx.last_insert_rowid();
  debug!(table = sql.table, id, "entity inserted");
  Ok(id)
}

/// Body text plus the example snippet, if any, so both are searchable.
fn search_content(claim: &NewClaim) -> String {
  match claim.example.as_deref().filter(|e| !e.trim().is_empty()) {
    Some(example) => format!("{}\n{example}", claim.body),
    None => claim.body.clone(),
  }
}

fn load_linker(tx: &Transaction<'_>) -> Result<AutoLinker> {
  let packages =
    column_strings(tx, "SELECT path FROM packages", "load packages")?;
  let files = column_strings(tx, "SELECT path FROM files", "load files")?;

  let mut stmt = tx
    .prepare(
      "SELECT p.path, s.name
       FROM symbols s JOIN packages p ON p.id = s.package_id
       WHERE s.exported = 1",
    )
    .step("load symbols")?;
  let symbols = stmt
    .query_map([], |row| {
      Ok(KnownSymbol { package: row.get(0)?, name: row.get(1)? })
    })
    .step("load symbols")?
    .collect::<rusqlite::Result<Vec<_>>>()
    .step("load symbols")?;

  Ok(AutoLinker::new(packages, files, symbols))
}

fn column_strings(
  tx: &Transaction<'_>,
  sql: &str,
  step: &'static str,
) -> Result<Vec<String>> {
  let mut stmt = tx.prepare(sql).step(step)?;
  stmt
    .query_map([], |row| row.get(0))
    .step(step)?
    .collect::<rusqlite::Result<Vec<String>>>()
    .step(step)
}

fn insert_candidates(
  tx: &Transaction<'_>,
  kind: ClaimKind,
  entity_id: i64,
  candidates: &[LinkCandidate],
  now: &str,
) -> Result<usize> {
  let mut inserted = 0;
  for candidate in candidates {
    inserted += tx
      .execute(
        "INSERT OR IGNORE INTO edges (
           from_type, from_id, to_type, to_ref, relation, source, confidence,
           created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
          kind.as_str(),
          entity_id,
          candidate.to_type.as_str(),
          candidate.to_ref,
          candidate.relation,
          EdgeSource::Auto.as_str(),
          candidate.confidence.as_str(),
          now,
        ],
      )
      .step("insert edge")?;
  }
  Ok(inserted)
}

// ─── Manual edges ────────────────────────────────────────────────────────────

/// Record a manual edge. The owning claim must exist; an identical edge
/// already present is left alone.
pub fn link(
  conn: &Connection,
  edge: &NewEdge,
  now: DateTime<Utc>,
) -> Result<bool> {
  if edge.relation.trim().is_empty() {
    return Err(strata_core::Error::MissingField("relation").into());
  }
  if edge.to_ref.trim().is_empty() {
    return Err(strata_core::Error::MissingField("target").into());
  }

  let table = kind_sql(edge.from_type).table;
  let exists = conn
    .query_row(
      &format!("SELECT 1 FROM {table} WHERE id = ?1"),
      params![edge.from_id],
      |_| Ok(()),
    )
    .optional()
    .step("look up edge owner")?
    .is_some();
  if !exists {
    return Err(Error::EntityNotFound {
      kind: edge.from_type.as_str(),
      id:   edge.from_id,
    });
  }

  let inserted = conn
    .execute(
      "INSERT OR IGNORE INTO edges (
         from_type, from_id, to_type, to_ref, relation, source, confidence,
         created_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
      params![
        edge.from_type.as_str(),
        edge.from_id,
        edge.to_type.as_str(),
        edge.to_ref,
        edge.relation,
        EdgeSource::Manual.as_str(),
        edge.confidence.as_str(),
        encode_dt(now),
      ],
    )
    .step("insert edge")?;
  Ok(inserted > 0)
}
