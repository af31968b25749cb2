//! Versioned schema migrations.
//!
//! The applied version lives in `PRAGMA user_version`. Each pending
//! [`Migration`] runs in its own transaction together with the version bump,
//! so a failed step leaves the database at the previous version and
//! re-running a fully applied set is a no-op.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::{Error, Result, error::StepContext as _, tx::in_transaction};

/// Pragmas applied on every connection, outside any transaction.
pub const CONNECTION_PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
";

/// A single schema step.
#[derive(Clone, Copy)]
pub struct Migration {
  pub version: u32,
  pub name:    &'static str,
  pub apply:   fn(&Connection) -> rusqlite::Result<()>,
}

/// An ordered set of migrations.
///
/// [`Migrator::standard`] is what the store runs on open; tests build their
/// own sets (e.g. a prefix of the standard set, or one with a failing step).
#[derive(Clone)]
pub struct Migrator {
  steps: Vec<Migration>,
}

impl Migrator {
  pub fn new(steps: Vec<Migration>) -> Self { Self { steps } }

  /// The migrations shipped with this crate.
  pub fn standard() -> Self {
    Self::new(vec![
      Migration {
        version: 1,
        name:    "index_and_decisions",
        apply:   v1_index_and_decisions,
      },
      Migration {
        version: 2,
        name:    "knowledge_graph",
        apply:   v2_knowledge_graph,
      },
      Migration {
        version: 3,
        name:    "symbol_deps_context",
        apply:   v3_symbol_deps_context,
      },
    ])
  }

  /// Only the steps up to and including `version`.
  pub fn until(mut self, version: u32) -> Self {
    self.steps.retain(|m| m.version <= version);
    self
  }

  /// Apply every step newer than the database's current version and return
  /// the resulting version.
  pub fn run(&self, conn: &mut Connection) -> Result<u32> {
    let mut current = schema_version(conn)?;
    for migration in &self.steps {
      if migration.version <= current {
        continue;
      }
      debug!(
        version = migration.version,
        name = migration.name,
        "applying migration"
      );
      in_transaction(conn, "commit migration", |tx| {
        (migration.apply)(tx).map_err(|source| Error::Migration {
          version: migration.version,
          name: migration.name,
          source,
        })?;
        tx.pragma_update(None, "user_version", migration.version)
          .step("bump schema version")
      })?;
      current = migration.version;
      info!(version = current, name = migration.name, "migration applied");
    }
    Ok(current)
  }
}

/// The version recorded in `PRAGMA user_version`.
pub fn schema_version(conn: &Connection) -> Result<u32> {
  conn
    .pragma_query_value(None, "user_version", |row| row.get(0))
    .step("read schema version")
}

fn column_exists(
  conn: &Connection,
  table: &str,
  column: &str,
) -> rusqlite::Result<bool> {
  let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
  let names = stmt
    .query_map([], |row| row.get::<_, String>(1))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(names.iter().any(|n| n == column))
}

// ─── v1 ──────────────────────────────────────────────────────────────────────

/// Index tables owned by the external indexer, plus decisions, evidence,
/// the search index and sync state.
fn v1_index_and_decisions(conn: &Connection) -> rusqlite::Result<()> {
  conn.execute_batch(
    "
CREATE TABLE IF NOT EXISTS packages (
    id          INTEGER PRIMARY KEY,
    path        TEXT NOT NULL UNIQUE,   -- repository-relative, '.' for root
    name        TEXT NOT NULL,
    file_count  INTEGER NOT NULL DEFAULT 0,
    line_count  INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS files (
    id          INTEGER PRIMARY KEY,
    package_id  INTEGER REFERENCES packages(id),
    path        TEXT NOT NULL UNIQUE,
    line_count  INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS symbols (
    id          INTEGER PRIMARY KEY,
    package_id  INTEGER NOT NULL REFERENCES packages(id),
    file_id     INTEGER REFERENCES files(id),
    name        TEXT NOT NULL,
    kind        TEXT NOT NULL DEFAULT '',
    exported    INTEGER NOT NULL DEFAULT 0,
    line        INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS imports (
    id          INTEGER PRIMARY KEY,
    file_id     INTEGER NOT NULL REFERENCES files(id),
    import_path TEXT NOT NULL,
    UNIQUE (file_id, import_path)
);

-- Original two-column shape; widened in v3.
CREATE TABLE IF NOT EXISTS symbol_deps (
    symbol_id   INTEGER NOT NULL REFERENCES symbols(id),
    dep_name    TEXT NOT NULL,
    UNIQUE (symbol_id, dep_name)
);

CREATE TABLE IF NOT EXISTS decisions (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    title       TEXT NOT NULL,
    reasoning   TEXT NOT NULL DEFAULT '',
    confidence  TEXT NOT NULL DEFAULT 'medium',  -- 'low' | 'medium' | 'high'
    -- 'pending' | 'active' | 'archived'
    status      TEXT NOT NULL DEFAULT 'pending',
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS evidence (
    id           INTEGER PRIMARY KEY,
    entity_type  TEXT NOT NULL,                  -- 'decision' | 'pattern'
    entity_id    INTEGER,                        -- NULL until promoted
    summary      TEXT NOT NULL,
    -- 'ok' | 'drifting' | 'unknown'
    drift_status TEXT NOT NULL DEFAULT 'unknown'
);

-- Written only for active claims.
CREATE VIRTUAL TABLE IF NOT EXISTS search_index USING fts5(
    title,
    content,
    entity_type UNINDEXED,
    entity_id   UNINDEXED
);

CREATE TABLE IF NOT EXISTS sync_state (
    id                 INTEGER PRIMARY KEY CHECK (id = 1),
    last_sync_at       TEXT NOT NULL,        -- RFC 3339 UTC
    last_sync_commit   TEXT NOT NULL DEFAULT '',
    last_sync_dirty    INTEGER NOT NULL DEFAULT 0,
    indexed_file_count INTEGER NOT NULL DEFAULT 0,
    index_fingerprint  TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS files_package_idx   ON files(package_id);
CREATE INDEX IF NOT EXISTS symbols_name_idx    ON symbols(name);
CREATE INDEX IF NOT EXISTS symbols_package_idx ON symbols(package_id);
CREATE INDEX IF NOT EXISTS imports_file_idx    ON imports(file_id);
CREATE INDEX IF NOT EXISTS decisions_status_idx
    ON decisions(status, updated_at);
CREATE UNIQUE INDEX IF NOT EXISTS evidence_entity_idx
    ON evidence(entity_type, entity_id);
",
  )
}

// ─── v2 ──────────────────────────────────────────────────────────────────────

/// Patterns, proposals and the generic edge table.
fn v2_knowledge_graph(conn: &Connection) -> rusqlite::Result<()> {
  conn.execute_batch(
    "
CREATE TABLE IF NOT EXISTS patterns (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    title       TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    example     TEXT,
    confidence  TEXT NOT NULL DEFAULT 'medium',
    status      TEXT NOT NULL DEFAULT 'pending',
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS proposals (
    id                   INTEGER PRIMARY KEY AUTOINCREMENT,
    kind                 TEXT NOT NULL,      -- 'decision' | 'pattern'
    title                TEXT NOT NULL,
    body                 TEXT NOT NULL DEFAULT '',
    example              TEXT,
    confidence           TEXT NOT NULL DEFAULT 'medium',
    evidence_summary     TEXT NOT NULL,
    check_type           TEXT NOT NULL,
    check_spec           TEXT NOT NULL,      -- raw JSON as supplied
    status               TEXT NOT NULL DEFAULT 'pending', -- or 'resolved'
    entity_id            INTEGER,
    verification_details TEXT,
    created_at           TEXT NOT NULL,
    resolved_at          TEXT
);

CREATE TABLE IF NOT EXISTS edges (
    id          INTEGER PRIMARY KEY,
    from_type   TEXT NOT NULL,
    from_id     INTEGER NOT NULL,
    to_type     TEXT NOT NULL,               -- package, file, symbol, claim
    to_ref      TEXT NOT NULL,
    relation    TEXT NOT NULL,
    source      TEXT NOT NULL DEFAULT 'auto', -- 'auto' | 'manual'
    confidence  TEXT NOT NULL DEFAULT 'medium',
    created_at  TEXT NOT NULL,
    UNIQUE (from_type, from_id, to_type, to_ref, relation)
);

CREATE INDEX IF NOT EXISTS edges_from_idx   ON edges(from_type, from_id);
CREATE INDEX IF NOT EXISTS edges_target_idx ON edges(to_type, to_ref);
CREATE INDEX IF NOT EXISTS patterns_status_idx ON patterns(status, updated_at);
",
  )?;

  if !column_exists(conn, "evidence", "proposal_id")? {
    conn.execute_batch(
      "ALTER TABLE evidence
         ADD COLUMN proposal_id INTEGER REFERENCES proposals(id);",
    )?;
  }
  Ok(())
}

// ─── v3 ──────────────────────────────────────────────────────────────────────

/// Give `symbol_deps` the originating package and kind of each dependency.
///
/// Existing rows are kept with empty context. Uniqueness now spans all four
/// columns: the same name from different packages or kinds is allowed, an
/// exact duplicate is not.
fn v3_symbol_deps_context(conn: &Connection) -> rusqlite::Result<()> {
  if column_exists(conn, "symbol_deps", "dep_package")? {
    return Ok(());
  }
  conn.execute_batch(
    "
CREATE TABLE symbol_deps_v3 (
    symbol_id   INTEGER NOT NULL REFERENCES symbols(id),
    dep_name    TEXT NOT NULL,
    dep_package TEXT NOT NULL DEFAULT '',
    dep_kind    TEXT NOT NULL DEFAULT '',
    UNIQUE (symbol_id, dep_name, dep_package, dep_kind)
);

INSERT INTO symbol_deps_v3 (symbol_id, dep_name, dep_package, dep_kind)
    SELECT symbol_id, dep_name, '', '' FROM symbol_deps;

DROP TABLE symbol_deps;
ALTER TABLE symbol_deps_v3 RENAME TO symbol_deps;

CREATE INDEX IF NOT EXISTS symbol_deps_name_idx ON symbol_deps(dep_name);
",
  )
}
