//! Builds the orient payload from the index, the knowledge tables and live
//! repository signals.
//!
//! Every step either succeeds or aborts the whole build with its step name;
//! only the freshness oracle's soft failures end up in `warnings`.

use std::collections::HashMap;

use rusqlite::{Connection, params};
use strata_core::{
  freshness,
  orient::{
    Architecture, DEFAULT_LIST_CAP, FlowEdge, HEAT_WINDOW_COMMITS, Heat,
    Knowledge, ModuleSummary, OrientOptions, OrientPayload,
    RECENT_ACTIVITY_LIMIT, Summary,
  },
  probe::{ProbeError, RepoProbe},
};
use tracing::debug;

use crate::{
  Result,
  encode::{RawClaimSummary, RawKnowledge},
  error::StepContext as _,
  sync_state,
};

fn probe_step(step: &'static str) -> impl FnOnce(ProbeError) -> crate::Error {
  move |source| strata_core::Error::Probe { step, source }.into()
}

fn limit(n: usize) -> i64 { i64::try_from(n).unwrap_or(i64::MAX) }

pub fn build(
  conn: &Connection,
  probe: &dyn RepoProbe,
  options: &OrientOptions,
) -> Result<OrientPayload> {
  let root = options.module_root.as_path();

  let project = probe
    .describe_module(root)
    .map_err(probe_step("resolve project"))?;

  let last_sync = sync_state::load(conn)?;
  let mut warnings = Vec::new();
  let freshness =
    freshness::assess(last_sync.as_ref(), probe, root, &mut warnings)?;

  let summary = Summary {
    files:     count(conn, "SELECT COUNT(*) FROM files", "count files")?,
    symbols:   count(conn, "SELECT COUNT(*) FROM symbols", "count symbols")?,
    packages:  count(conn, "SELECT COUNT(*) FROM packages", "count packages")?,
    decisions: count(
      conn,
      "SELECT COUNT(*) FROM decisions WHERE status = 'active'",
      "count decisions",
    )?,
  };

  let touches = probe
    .touch_counts(root, HEAT_WINDOW_COMMITS)
    .map_err(probe_step("read commit heat"))?;
  let modules = load_modules(conn, options.module_limit(), &touches)?;

  let decision_limit = options.decision_limit();
  let decisions =
    load_claims(conn, DECISIONS_SQL, decision_limit, "query decisions")?
      .into_iter()
      .map(RawClaimSummary::into_decision)
      .collect::<Result<Vec<_>>>()?;
  let patterns =
    load_claims(conn, PATTERNS_SQL, DEFAULT_LIST_CAP, "query patterns")?
      .into_iter()
      .map(RawClaimSummary::into_pattern)
      .collect::<Result<Vec<_>>>()?;

  let architecture = Architecture {
    entry_points:    entry_points(conn)?,
    dependency_flow: dependency_flow(conn, &project.module)?,
  };

  let mut recent_activity = probe
    .file_activity(root)
    .map_err(probe_step("read recent activity"))?;
  recent_activity.sort_by(|a, b| {
    b.modified_at
      .cmp(&a.modified_at)
      .then_with(|| a.path.cmp(&b.path))
  });
  recent_activity.truncate(RECENT_ACTIVITY_LIMIT);

  debug!(
    modules = modules.len(),
    decisions = decisions.len(),
    patterns = patterns.len(),
    stale = freshness.is_stale,
    "orient payload built"
  );

  Ok(OrientPayload {
    project,
    architecture,
    freshness,
    last_sync,
    summary,
    modules,
    decisions,
    patterns,
    recent_activity,
    warnings,
  })
}

fn count(conn: &Connection, sql: &str, step: &'static str) -> Result<i64> {
  conn.query_row(sql, [], |row| row.get(0)).step(step)
}

// ─── Modules ─────────────────────────────────────────────────────────────────

fn load_modules(
  conn: &Connection,
  module_limit: usize,
  touches: &HashMap<String, u32>,
) -> Result<Vec<ModuleSummary>> {
  let mut stmt = conn
    .prepare(
      "SELECT path, name, file_count, line_count
       FROM packages
       ORDER BY file_count DESC, line_count DESC, path
       LIMIT ?1",
    )
    .step("query modules")?;
  let rows = stmt
    .query_map(params![limit(module_limit)], |row| {
      Ok((
        row.get::<_, String>(0)?,
        row.get::<_, String>(1)?,
        row.get::<_, i64>(2)?,
        row.get::<_, i64>(3)?,
      ))
    })
    .step("query modules")?
    .collect::<rusqlite::Result<Vec<_>>>()
    .step("query modules")?;

  let mut modules = Vec::with_capacity(rows.len());
  for (path, name, file_count, line_count) in rows {
    let touched = touches.get(&path).copied().unwrap_or(0);
    let knowledge = module_knowledge(conn, &path)?;
    modules.push(ModuleSummary {
      path,
      name,
      file_count,
      line_count,
      touches: touched,
      heat: Heat::classify(touched),
      knowledge,
    });
  }
  Ok(modules)
}

/// Active claims linked to `path` by a package edge.
fn module_knowledge(conn: &Connection, path: &str) -> Result<Vec<Knowledge>> {
  let mut stmt = conn
    .prepare_cached(
      "SELECT e.from_type, e.from_id, e.relation, e.confidence,
              COALESCE(d.title, p.title), COALESCE(d.confidence, p.confidence)
       FROM edges e
       LEFT JOIN decisions d
              ON e.from_type = 'decision' AND d.id = e.from_id
              AND d.status = 'active'
       LEFT JOIN patterns p
              ON e.from_type = 'pattern' AND p.id = e.from_id
              AND p.status = 'active'
       WHERE e.to_type = 'package' AND e.to_ref = ?1
         AND COALESCE(d.id, p.id) IS NOT NULL
       ORDER BY e.from_type, e.from_id, e.relation",
    )
    .step("query module knowledge")?;
  let raws = stmt
    .query_map(params![path], |row| {
      Ok(RawKnowledge {
        kind:            row.get(0)?,
        id:              row.get(1)?,
        relation:        row.get(2)?,
        edge_confidence: row.get(3)?,
        title:           row.get(4)?,
        confidence:      row.get(5)?,
      })
    })
    .step("query module knowledge")?
    .collect::<rusqlite::Result<Vec<_>>>()
    .step("query module knowledge")?;
  raws.into_iter().map(RawKnowledge::into_knowledge).collect()
}

// ─── Decisions and patterns ──────────────────────────────────────────────────

const DECISIONS_SQL: &str = "
SELECT d.id, d.title, d.reasoning, NULL, d.confidence, e.drift_status,
       d.updated_at
FROM decisions d
LEFT JOIN evidence e ON e.entity_type = 'decision' AND e.entity_id = d.id
WHERE d.status = 'active'
ORDER BY d.updated_at DESC, d.id DESC
LIMIT ?1";

const PATTERNS_SQL: &str = "
SELECT p.id, p.title, p.description, p.example, p.confidence,
       e.drift_status, p.updated_at
FROM patterns p
LEFT JOIN evidence e ON e.entity_type = 'pattern' AND e.entity_id = p.id
WHERE p.status = 'active'
ORDER BY p.updated_at DESC, p.id DESC
LIMIT ?1";

fn load_claims(
  conn: &Connection,
  sql: &str,
  max: usize,
  step: &'static str,
) -> Result<Vec<RawClaimSummary>> {
  let mut stmt = conn.prepare(sql).step(step)?;
  stmt
    .query_map(params![limit(max)], |row| {
      Ok(RawClaimSummary {
        id:           row.get(0)?,
        title:        row.get(1)?,
        body:         row.get(2)?,
        example:      row.get(3)?,
        confidence:   row.get(4)?,
        drift_status: row.get(5)?,
        updated_at:   row.get(6)?,
      })
    })
    .step(step)?
    .collect::<rusqlite::Result<Vec<_>>>()
    .step(step)
}

// ─── Architecture ────────────────────────────────────────────────────────────

/// Files of the package named `main` or of the repository root package.
fn entry_points(conn: &Connection) -> Result<Vec<String>> {
  let mut stmt = conn
    .prepare(
      "SELECT f.path
       FROM files f JOIN packages p ON p.id = f.package_id
       WHERE p.name = 'main' OR p.path IN ('.', '')
       ORDER BY f.path",
    )
    .step("query entry points")?;
  stmt
    .query_map([], |row| row.get(0))
    .step("query entry points")?
    .collect::<rusqlite::Result<Vec<String>>>()
    .step("query entry points")
}

/// Package-to-package import edges, grouped by importing package.
///
/// An import resolves to a package when it names the package path directly
/// or as `<module>/<path>`.
fn dependency_flow(conn: &Connection, module: &str) -> Result<Vec<FlowEdge>> {
  let mut stmt = conn
    .prepare(
      "SELECT DISTINCT src.path, dst.path
       FROM imports i
       JOIN files f       ON f.id = i.file_id
       JOIN packages src  ON src.id = f.package_id
       JOIN packages dst  ON i.import_path = dst.path
                          OR i.import_path = ?1 || '/' || dst.path
       WHERE src.id != dst.id
       ORDER BY src.path, dst.path",
    )
    .step("query dependency flow")?;
  let pairs = stmt
    .query_map(params![module], |row| {
      Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })
    .step("query dependency flow")?
    .collect::<rusqlite::Result<Vec<_>>>()
    .step("query dependency flow")?;

  let mut flow: Vec<FlowEdge> = Vec::new();
  for (from, to) in pairs {
    match flow.last_mut() {
      Some(edge) if edge.from == from => edge.to.push(to),
      _ => flow.push(FlowEdge { from, to: vec![to] }),
    }
  }
  Ok(flow)
}
