//! Integration tests for `SqliteStore` against an in-memory database.

use std::{
  collections::HashMap,
  fs,
  path::{Path, PathBuf},
  sync::Arc,
};

use chrono::{Duration, TimeZone as _, Utc};
use serde_json::json;
use strata_core::{
  check::CheckDescriptor,
  claim::{ClaimKind, Confidence, NewClaim},
  edge::{EdgeSource, NewEdge, TargetType},
  freshness::StaleReason,
  orient::{Heat, OrientOptions, OrientPayload},
  probe::{
    DiffStats, FileActivity, ModuleDescriptor, ProbeError, RepoProbe, VcsState,
  },
  recall::{MatchMode, RecallOptions},
  store::KnowledgeStore,
  sync::SyncState,
};

use crate::{Error, Migration, Migrator, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn exec(s: &SqliteStore, sql: &'static str) {
  s.conn
    .call(move |conn| {
      conn.execute_batch(sql)?;
      Ok(())
    })
    .await
    .expect("seed sql");
}

async fn count(s: &SqliteStore, sql: &'static str) -> i64 {
  s.conn
    .call(move |conn| Ok(conn.query_row(sql, [], |row| row.get::<_, i64>(0))?))
    .await
    .expect("count query")
}

/// A small Go-style index: three packages, a handful of files, one
/// distinctive exported symbol and a few imports.
const INDEX: &str = "
INSERT INTO packages (id, path, name, file_count, line_count) VALUES
  (1, 'internal/cli',    'cli',    4, 400),
  (2, 'internal/orient', 'orient', 3, 300),
  (3, 'cmd/strata',      'main',   1,  50);
INSERT INTO files (id, package_id, path, line_count) VALUES
  (1, 1, 'internal/cli/root.go',      120),
  (2, 1, 'internal/cli/errors.go',     40),
  (3, 2, 'internal/orient/build.go',  200),
  (4, 3, 'cmd/strata/main.go',         50);
INSERT INTO symbols (id, package_id, file_id, name, kind, exported, line) VALUES
  (1, 1, 2, 'ExitError', 'type', 1, 10),
  (2, 1, 1, 'Run',       'func', 1, 20),
  (3, 2, 3, 'buildPayload', 'func', 0, 30);
INSERT INTO imports (file_id, import_path) VALUES
  (1, 'example.com/strata/internal/orient'),
  (4, 'example.com/strata/internal/cli'),
  (4, 'fmt');
";

fn decision(title: &str, body: &str, check: CheckDescriptor) -> NewClaim {
  NewClaim::new(ClaimKind::Decision, title, body, "seen during review", check)
}

fn pattern(title: &str, body: &str, check: CheckDescriptor) -> NewClaim {
  let evidence = "every handler does this";
  NewClaim::new(ClaimKind::Pattern, title, body, evidence, check)
}

fn symbol_check(name: &str) -> CheckDescriptor {
  CheckDescriptor::new("symbol_exists", json!({ "name": name }))
}

fn file_check(path: &str) -> CheckDescriptor {
  CheckDescriptor::new("file_exists", json!({ "path": path }))
}

fn repo_with_go_mod() -> tempfile::TempDir {
  let dir = tempfile::tempdir().unwrap();
  fs::write(dir.path().join("go.mod"), "module example.com/strata\n").unwrap();
  dir
}

// ─── Promotion ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn passing_check_promotes_and_links() {
  let s = store().await;
  exec(&s, INDEX).await;

  let result = s
    .propose(
      decision(
        "Wrap CLI failures in ExitError",
        "Used in internal/cli for all commands, also affects internal/orient",
        symbol_check("ExitError"),
      ),
      PathBuf::from("."),
    )
    .await
    .unwrap();

  assert!(result.promoted);
  assert!(result.verification_passed);
  assert!(result.verification_details.contains("ExitError"));
  let id = result.entity_id.expect("entity id");
  assert_eq!(result.linked_edges, 3);

  assert_eq!(
    count(&s, "SELECT COUNT(*) FROM decisions WHERE status = 'active'").await,
    1
  );
  assert_eq!(
    count(&s, "SELECT COUNT(*) FROM evidence WHERE entity_type = 'decision'")
      .await,
    1
  );
  assert_eq!(count(&s, "SELECT COUNT(*) FROM search_index").await, 1);
  assert_eq!(
    count(&s, "SELECT COUNT(*) FROM proposals WHERE status = 'resolved'").await,
    1
  );
  assert_eq!(
    count(&s, "SELECT COUNT(*) FROM edges WHERE source = 'auto'").await,
    3
  );
  let linked_id = count(
    &s,
    "SELECT entity_id FROM proposals WHERE status = 'resolved'",
  )
  .await;
  assert_eq!(linked_id, id);
}

#[tokio::test]
async fn failing_check_leaves_proposal_pending() {
  let s = store().await;
  exec(&s, INDEX).await;
  let repo = repo_with_go_mod();

  let result = s
    .propose(
      pattern(
        "Handlers live in internal/cli",
        "See internal/cli",
        file_check("internal/cli/handlers.go"),
      ),
      repo.path().to_path_buf(),
    )
    .await
    .unwrap();

  assert!(!result.promoted);
  assert!(!result.verification_passed);
  assert_eq!(result.entity_id, None);
  assert!(result.verification_details.contains("internal/cli/handlers.go"));

  assert_eq!(count(&s, "SELECT COUNT(*) FROM patterns").await, 0);
  assert_eq!(count(&s, "SELECT COUNT(*) FROM search_index").await, 0);
  assert_eq!(count(&s, "SELECT COUNT(*) FROM edges").await, 0);
  assert_eq!(
    count(&s, "SELECT COUNT(*) FROM proposals WHERE status = 'pending'").await,
    1
  );
  assert_eq!(
    count(
      &s,
      "SELECT COUNT(*) FROM evidence
        WHERE entity_id IS NULL AND proposal_id IS NOT NULL"
    )
    .await,
    1
  );
}

#[tokio::test]
async fn invalid_claims_persist_nothing() {
  let s = store().await;
  let repo = repo_with_go_mod();

  let err = s
    .propose(decision("  ", "body", file_check("go.mod")), repo.path().into())
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(strata_core::Error::MissingField("title"))
  ));

  let err = s
    .propose(
      decision(
        "Use modules",
        "body",
        CheckDescriptor::new("", json!({ "path": "go.mod" })),
      ),
      repo.path().into(),
    )
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(strata_core::Error::MissingField("check type"))
  ));

  let err = s
    .propose(
      decision(
        "Use slog",
        "body",
        CheckDescriptor::new("grep_pattern", json!({ "pattern": "slog.(" })),
      ),
      repo.path().into(),
    )
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(strata_core::Error::InvalidCheck(_))
  ));

  let mut claim = decision("Use modules", "body", file_check("go.mod"));
  claim.evidence = String::new();
  let err = s.propose(claim, repo.path().into()).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Core(strata_core::Error::MissingField("evidence summary"))
  ));

  assert_eq!(count(&s, "SELECT COUNT(*) FROM proposals").await, 0);
  assert_eq!(count(&s, "SELECT COUNT(*) FROM evidence").await, 0);
}

#[tokio::test]
async fn failed_write_rolls_back_the_whole_promotion() {
  let s = store().await;
  exec(&s, INDEX).await;
  exec(&s, "DROP TABLE search_index;").await;

  let err = s
    .propose(
      decision(
        "Wrap CLI failures in ExitError",
        "Used in internal/cli for all commands",
        symbol_check("ExitError"),
      ),
      PathBuf::from("."),
    )
    .await
    .unwrap_err();
  assert!(
    matches!(err, Error::Step { step: "insert search index", .. }),
    "{err}"
  );
  assert!(err.to_string().starts_with("insert search index: "));

  assert_eq!(count(&s, "SELECT COUNT(*) FROM proposals").await, 0);
  assert_eq!(count(&s, "SELECT COUNT(*) FROM decisions").await, 0);
  assert_eq!(count(&s, "SELECT COUNT(*) FROM evidence").await, 0);
  assert_eq!(count(&s, "SELECT COUNT(*) FROM edges").await, 0);
}

#[tokio::test]
async fn checks_cannot_reach_outside_the_repository() {
  let s = store().await;
  let repo = repo_with_go_mod();

  let err = s
    .propose(
      decision("Vendored deps", "body", file_check("../go.mod")),
      repo.path().into(),
    )
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(strata_core::Error::InvalidCheck(_))
  ));
  assert_eq!(count(&s, "SELECT COUNT(*) FROM proposals").await, 0);
}

// ─── Manual edges ────────────────────────────────────────────────────────────

#[tokio::test]
async fn manual_link_requires_owner_and_ignores_duplicates() {
  let s = store().await;
  let repo = repo_with_go_mod();

  let edge = |from_id| NewEdge {
    from_type: ClaimKind::Decision,
    from_id,
    to_type: TargetType::File,
    to_ref: "go.mod".into(),
    relation: "documents".into(),
    confidence: Confidence::High,
  };

  let err = s.link(edge(42)).await.unwrap_err();
  assert!(matches!(err, Error::EntityNotFound { kind: "decision", id: 42 }));

  let id = s
    .propose(
      decision("Go modules only", "no vendoring", file_check("go.mod")),
      repo.path().into(),
    )
    .await
    .unwrap()
    .entity_id
    .unwrap();

  assert!(s.link(edge(id)).await.unwrap());
  assert!(!s.link(edge(id)).await.unwrap());

  let hits = s
    .recall("modules".into(), RecallOptions::default())
    .await
    .unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].edges.len(), 1);
  assert_eq!(hits[0].edges[0].source, EdgeSource::Manual);
  assert_eq!(hits[0].edges[0].to_ref, "go.mod");
}

// ─── Recall ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn recall_round_trip_and_substring_fallback() {
  let s = store().await;
  let repo = repo_with_go_mod();

  let promoted = s
    .propose(
      pattern(
        "Retry and backoff for webhooks",
        "Outbound webhook calls retry with exponential backoff",
        file_check("go.mod"),
      ),
      repo.path().into(),
    )
    .await
    .unwrap();
  assert!(promoted.promoted);

  let hits = s
    .recall("backoff".into(), RecallOptions::default())
    .await
    .unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].kind, ClaimKind::Pattern);
  assert_eq!(hits[0].title, "Retry and backoff for webhooks");
  assert_eq!(hits[0].matched_by, MatchMode::FullText);
  assert_eq!(
    hits[0].evidence_summary.as_deref(),
    Some("every handler does this")
  );

  // A bare operator is not a valid full-text query.
  let hits = s
    .recall("AND".into(), RecallOptions::default())
    .await
    .unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].matched_by, MatchMode::Substring);
  assert_eq!(hits[0].id, promoted.entity_id.unwrap());
}

#[tokio::test]
async fn recall_rejects_blank_query() {
  let s = store().await;
  let err = s.recall("   ".into(), RecallOptions::default()).await.unwrap_err();
  assert!(matches!(err, Error::InvalidQuery(_)));
}

#[tokio::test]
async fn recall_surfaces_genuine_failures_with_the_tier() {
  let s = store().await;
  exec(&s, "DROP TABLE search_index;").await;

  let err = s
    .recall("webhooks".into(), RecallOptions::default())
    .await
    .unwrap_err();
  assert!(
    matches!(err, Error::Step { step: "recall full-text", .. }),
    "{err}"
  );
  assert!(err.to_string().contains("no such table: search_index"));
}

#[tokio::test]
async fn recall_kind_filter_applies_after_retrieval() {
  let s = store().await;
  let repo = repo_with_go_mod();

  s.propose(
    decision(
      "Webhooks are signed",
      "HMAC on every delivery",
      file_check("go.mod"),
    ),
    repo.path().into(),
  )
  .await
  .unwrap();
  s.propose(
    pattern(
      "Webhook handlers verify first",
      "verify then decode",
      file_check("go.mod"),
    ),
    repo.path().into(),
  )
  .await
  .unwrap();

  let all = s
    .recall("webhooks OR webhook".into(), RecallOptions::default())
    .await
    .unwrap();
  assert_eq!(all.len(), 2);

  let only = s
    .recall("webhooks OR webhook".into(), RecallOptions {
      kind: Some(ClaimKind::Decision),
      ..RecallOptions::default()
    })
    .await
    .unwrap();
  assert_eq!(only.len(), 1);
  assert_eq!(only[0].kind, ClaimKind::Decision);
}

#[tokio::test]
async fn recall_enriches_hits_with_ordered_edges() {
  let s = store().await;
  exec(&s, INDEX).await;

  s.propose(
    decision(
      "Wrap CLI failures in ExitError",
      "Used in internal/cli for all commands, also affects internal/orient",
      symbol_check("ExitError"),
    ),
    PathBuf::from("."),
  )
  .await
  .unwrap();

  let hits = s
    .recall("ExitError".into(), RecallOptions::default())
    .await
    .unwrap();
  assert_eq!(hits.len(), 1);
  let edges: Vec<_> = hits[0]
    .edges
    .iter()
    .map(|e| (e.relation.as_str(), e.to_type, e.to_ref.as_str()))
    .collect();
  assert_eq!(edges, vec![
    ("affects", TargetType::Package, "internal/cli"),
    ("affects", TargetType::Package, "internal/orient"),
    ("references", TargetType::Symbol, "internal/cli.ExitError"),
  ]);
}

#[tokio::test]
async fn recall_on_legacy_schema_searches_decisions_only() {
  let s = SqliteStore::open_in_memory_with(Migrator::standard().until(1))
    .await
    .unwrap();
  exec(
    &s,
    "INSERT INTO decisions (
       id, title, reasoning, confidence, status, created_at, updated_at
     ) VALUES (
       1, 'Retry and backoff for webhooks', 'exponential', 'high', 'active',
       '2026-01-01T00:00:00.000000Z', '2026-01-01T00:00:00.000000Z'
     );
     INSERT INTO evidence (entity_type, entity_id, summary)
     VALUES ('decision', 1, 'incident 12');
     INSERT INTO search_index (title, content, entity_type, entity_id)
     VALUES ('Retry and backoff for webhooks', 'exponential', 'decision', 1);",
  )
  .await;

  let hits = s
    .recall("backoff".into(), RecallOptions::default())
    .await
    .unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].matched_by, MatchMode::FullText);
  assert_eq!(hits[0].confidence, Confidence::High);
  // The legacy schema has no edge table; enrichment is skipped.
  assert!(hits[0].edges.is_empty());

  let hits = s
    .recall("AND".into(), RecallOptions::default())
    .await
    .unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].matched_by, MatchMode::Substring);
  assert_eq!(hits[0].evidence_summary.as_deref(), Some("incident 12"));
}

// ─── Sync state ──────────────────────────────────────────────────────────────

fn synced(commit: &str, dirty: bool, fingerprint: &str) -> SyncState {
  SyncState {
    last_sync_at:       Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
    last_sync_commit:   commit.into(),
    last_sync_dirty:    dirty,
    indexed_file_count: 4,
    index_fingerprint:  fingerprint.into(),
  }
}

#[tokio::test]
async fn sync_state_upsert_and_load() {
  let s = store().await;
  assert!(s.load_sync_state().await.unwrap().is_none());

  s.upsert_sync_state(synced("abc", false, "fp1")).await.unwrap();
  s.upsert_sync_state(synced("def", true, "fp2")).await.unwrap();

  let loaded = s.load_sync_state().await.unwrap().unwrap();
  assert_eq!(loaded, synced("def", true, "fp2"));
  assert_eq!(count(&s, "SELECT COUNT(*) FROM sync_state").await, 1);
}

#[tokio::test]
async fn corrupt_sync_timestamp_is_fatal() {
  let s = store().await;
  exec(
    &s,
    "INSERT INTO sync_state (id, last_sync_at, last_sync_commit)
     VALUES (1, 'yesterday', 'abc');",
  )
  .await;

  assert!(matches!(s.load_sync_state().await, Err(Error::DateParse(_))));
  let err = s
    .orient(Arc::new(FakeProbe::default()), OrientOptions::default())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::DateParse(_)));
}

// ─── Orient ──────────────────────────────────────────────────────────────────

#[derive(Clone)]
struct FakeProbe {
  head:        String,
  dirty:       bool,
  fingerprint: Option<String>,
  files:       usize,
  touches:     HashMap<String, u32>,
}

impl Default for FakeProbe {
  fn default() -> Self {
    Self {
      head:        "abc".into(),
      dirty:       false,
      fingerprint: Some("fp".into()),
      files:       7,
      touches:     HashMap::from([
        ("internal/cli".to_owned(), 9),
        ("internal/orient".to_owned(), 2),
      ]),
    }
  }
}

impl RepoProbe for FakeProbe {
  fn describe_module(
    &self,
    root: &Path,
  ) -> Result<ModuleDescriptor, ProbeError> {
    Ok(ModuleDescriptor {
      root:     root.to_path_buf(),
      module:   "example.com/strata".into(),
      language: "go".into(),
    })
  }

  fn vcs_state(&self, _root: &Path) -> Result<VcsState, ProbeError> {
    Ok(VcsState { head: self.head.clone(), dirty: self.dirty })
  }

  fn diff_stats(
    &self,
    _root: &Path,
    _from: &str,
    _to: &str,
  ) -> Result<DiffStats, ProbeError> {
    Ok(DiffStats { commits: 3, files_changed: 2 })
  }

  fn fingerprint(&self, _root: &Path) -> Result<String, ProbeError> {
    self
      .fingerprint
      .clone()
      .ok_or_else(|| ProbeError::Parse("permission denied: secrets.env".into()))
  }

  fn file_activity(
    &self,
    _root: &Path,
  ) -> Result<Vec<FileActivity>, ProbeError> {
    let base = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
    Ok(
      (0..self.files)
        .map(|i| FileActivity {
          path:        format!("file{i}.go"),
          modified_at: base + Duration::minutes(i as i64),
        })
        .collect(),
    )
  }

  fn touch_counts(
    &self,
    _root: &Path,
    _window: usize,
  ) -> Result<HashMap<String, u32>, ProbeError> {
    Ok(self.touches.clone())
  }
}

async fn orient_with(s: &SqliteStore, probe: FakeProbe) -> OrientPayload {
  s.orient(Arc::new(probe), OrientOptions {
    module_root: PathBuf::from("."),
    ..OrientOptions::default()
  })
  .await
  .unwrap()
}

#[tokio::test]
async fn orient_builds_full_payload() {
  let s = store().await;
  exec(&s, INDEX).await;
  s.upsert_sync_state(synced("abc", false, "fp")).await.unwrap();
  s.propose(
    decision(
      "Wrap CLI failures in ExitError",
      "Used in internal/cli for all commands",
      symbol_check("ExitError"),
    ),
    PathBuf::from("."),
  )
  .await
  .unwrap();

  let payload = orient_with(&s, FakeProbe::default()).await;

  assert!(!payload.freshness.is_stale);
  assert_eq!(payload.freshness.reason, StaleReason::Fresh);
  assert!(payload.warnings.is_empty());
  assert_eq!(payload.project.module, "example.com/strata");

  assert_eq!(payload.summary.files, 4);
  assert_eq!(payload.summary.symbols, 3);
  assert_eq!(payload.summary.packages, 3);
  assert_eq!(payload.summary.decisions, 1);

  let modules: Vec<_> = payload
    .modules
    .iter()
    .map(|m| (m.path.as_str(), m.heat))
    .collect();
  assert_eq!(modules, vec![
    ("internal/cli", Heat::Hot),
    ("internal/orient", Heat::Warm),
    ("cmd/strata", Heat::Cold),
  ]);
  assert_eq!(payload.modules[0].knowledge.len(), 1);
  assert_eq!(
    payload.modules[0].knowledge[0].title,
    "Wrap CLI failures in ExitError"
  );
  assert!(payload.modules[1].knowledge.is_empty());

  assert_eq!(payload.decisions.len(), 1);
  assert!(payload.patterns.is_empty());

  assert_eq!(payload.architecture.entry_points, vec!["cmd/strata/main.go"]);
  let flow: Vec<_> = payload
    .architecture
    .dependency_flow
    .iter()
    .map(|e| (e.from.as_str(), e.to.clone()))
    .collect();
  assert_eq!(flow, vec![
    ("cmd/strata", vec!["internal/cli".to_owned()]),
    ("internal/cli", vec!["internal/orient".to_owned()]),
  ]);

  assert_eq!(payload.recent_activity.len(), 5);
  assert_eq!(payload.recent_activity[0].path, "file6.go");
}

#[tokio::test]
async fn orient_recent_activity_is_capped() {
  let s = store().await;

  let seven = FakeProbe { files: 7, ..FakeProbe::default() };
  let payload = orient_with(&s, seven).await;
  assert_eq!(payload.recent_activity.len(), 5);

  let one = FakeProbe { files: 1, ..FakeProbe::default() };
  let payload = orient_with(&s, one).await;
  assert_eq!(payload.recent_activity.len(), 1);
}

#[tokio::test]
async fn orient_reports_head_change_before_dirty_change() {
  let s = store().await;
  s.upsert_sync_state(synced("old", true, "fp")).await.unwrap();

  let payload = orient_with(&s, FakeProbe::default()).await;
  assert!(payload.freshness.is_stale);
  assert_eq!(
    payload.freshness.reason,
    StaleReason::GitHeadChangedSinceLastSync
  );
  assert_eq!(
    payload.freshness.stale_summary.as_deref(),
    Some("3 commits, 2 files changed")
  );
}

#[tokio::test]
async fn orient_fingerprint_failure_is_a_warning() {
  let s = store().await;
  s.upsert_sync_state(synced("abc", false, "fp")).await.unwrap();

  let failing = FakeProbe { fingerprint: None, ..FakeProbe::default() };
  let payload = orient_with(&s, failing).await;
  assert!(!payload.freshness.is_stale);
  assert_eq!(payload.warnings.len(), 1);
  assert!(payload.warnings[0].contains("fingerprint check failed"));
}

#[tokio::test]
async fn orient_without_sync_state_is_never_synced() {
  let s = store().await;
  let payload = orient_with(&s, FakeProbe::default()).await;
  assert!(payload.freshness.is_stale);
  assert_eq!(payload.freshness.reason, StaleReason::NeverSynced);
  assert!(payload.last_sync.is_none());
}

#[tokio::test]
async fn orient_aborts_when_a_query_fails() {
  let s = SqliteStore::open_in_memory_with(Migrator::standard().until(1))
    .await
    .unwrap();
  s.upsert_sync_state(synced("abc", false, "fp")).await.unwrap();

  let err = s
    .orient(Arc::new(FakeProbe::default()), OrientOptions {
      module_root: PathBuf::from("."),
      ..OrientOptions::default()
    })
    .await
    .unwrap_err();
  assert!(
    matches!(err, Error::Step { step: "query patterns", .. }),
    "{err}"
  );
  assert!(err.to_string().starts_with("query patterns: "));
}

#[tokio::test]
async fn orient_honors_limits_above_the_default_cap() {
  let s = store().await;
  exec(
    &s,
    "WITH RECURSIVE n(i) AS (
       SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < 60
     )
     INSERT INTO decisions (
       title, reasoning, confidence, status, created_at, updated_at
     )
     SELECT 'Decision ' || i, 'reason', 'medium', 'active',
            '2026-01-01T00:00:00.000000Z', '2026-01-01T00:00:00.000000Z'
     FROM n;",
  )
  .await;

  let payload = s
    .orient(Arc::new(FakeProbe::default()), OrientOptions {
      module_root:   PathBuf::from("."),
      max_decisions: 60,
      ..OrientOptions::default()
    })
    .await
    .unwrap();
  assert_eq!(payload.decisions.len(), 60);

  let payload = orient_with(&s, FakeProbe::default()).await;
  assert_eq!(payload.decisions.len(), 50);
}

// ─── Migrations ──────────────────────────────────────────────────────────────

type SchemaRow = (String, String, Option<String>);

async fn schema_snapshot(s: &SqliteStore) -> Vec<SchemaRow> {
  s.conn
    .call(|conn| {
      let mut stmt =
        conn.prepare(
          "SELECT type, name, sql FROM sqlite_master ORDER BY type, name",
        )?;
      let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      Ok(rows)
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn migrations_are_idempotent() {
  let s = store().await;
  assert_eq!(s.schema_version().await.unwrap(), 3);
  exec(&s, INDEX).await;

  let before = schema_snapshot(&s).await;
  assert_eq!(s.migrate(Migrator::standard()).await.unwrap(), 3);
  assert_eq!(schema_snapshot(&s).await, before);
  assert_eq!(count(&s, "SELECT COUNT(*) FROM packages").await, 3);
}

#[tokio::test]
async fn symbol_deps_upgrade_preserves_rows_and_widens_uniqueness() {
  let s = SqliteStore::open_in_memory_with(Migrator::standard().until(2))
    .await
    .unwrap();
  exec(&s, INDEX).await;
  exec(
    &s,
    "INSERT INTO symbol_deps (symbol_id, dep_name) VALUES (1, 'Errorf');",
  )
  .await;

  assert_eq!(s.migrate(Migrator::standard()).await.unwrap(), 3);

  assert_eq!(
    count(
      &s,
      "SELECT COUNT(*) FROM symbol_deps
       WHERE symbol_id = 1 AND dep_name = 'Errorf'
         AND dep_package = '' AND dep_kind = ''"
    )
    .await,
    1
  );

  exec(
    &s,
    "INSERT INTO symbol_deps (symbol_id, dep_name, dep_package, dep_kind)
     VALUES (1, 'Errorf', 'fmt', 'func');",
  )
  .await;
  assert_eq!(count(&s, "SELECT COUNT(*) FROM symbol_deps").await, 2);

  let dup = s
    .conn
    .call(|conn| {
      Ok(conn.execute(
        "INSERT INTO symbol_deps (symbol_id, dep_name, dep_package, dep_kind)
         VALUES (1, 'Errorf', 'fmt', 'func')",
        [],
      ))
    })
    .await
    .unwrap();
  assert!(dup.is_err());
}

fn broken_step(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
  conn.execute_batch(
    "CREATE TABLE half_done (x INTEGER);
     INSERT INTO table_that_does_not_exist VALUES (1);",
  )
}

#[tokio::test]
async fn failed_migration_rolls_back() {
  let s = SqliteStore::open_in_memory_with(Migrator::standard().until(1))
    .await
    .unwrap();

  let err = s
    .migrate(Migrator::new(vec![Migration {
      version: 2,
      name:    "broken",
      apply:   broken_step,
    }]))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Migration { version: 2, .. }));

  assert_eq!(s.schema_version().await.unwrap(), 1);
  assert_eq!(
    count(&s, "SELECT COUNT(*) FROM sqlite_master WHERE name = 'half_done'")
      .await,
    0
  );
}
