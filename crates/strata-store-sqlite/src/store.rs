//! [`SqliteStore`] — the SQLite implementation of [`KnowledgeStore`].

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use chrono::Utc;
use strata_core::{
  claim::{NewClaim, PromotionResult},
  edge::NewEdge,
  orient::{OrientOptions, OrientPayload},
  probe::RepoProbe,
  recall::{RecallHit, RecallOptions},
  store::KnowledgeStore,
  sync::SyncState,
};

use crate::{
  Error, Result, orient, promote, recall,
  schema::{self, CONNECTION_PRAGMAS, Migrator},
  sync_state,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Strata knowledge store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and bring its schema up to date.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with(path, Migrator::standard()).await
  }

  /// Open a store at `path`, applying `migrator` instead of the standard
  /// migration set.
  pub async fn open_with(
    path: impl AsRef<Path>,
    migrator: Migrator,
  ) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init(migrator).await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    Self::open_in_memory_with(Migrator::standard()).await
  }

  pub async fn open_in_memory_with(migrator: Migrator) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init(migrator).await?;
    Ok(store)
  }

  async fn init(&self, migrator: Migrator) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(CONNECTION_PRAGMAS)?;
        Ok(())
      })
      .await?;
    self.migrate(migrator).await?;
    Ok(())
  }

  /// Apply any pending steps of `migrator`; returns the resulting schema
  /// version.
  pub async fn migrate(&self, migrator: Migrator) -> Result<u32> {
    self.conn.call(move |conn| Ok(migrator.run(conn))).await?
  }

  /// The schema version currently recorded in the database.
  pub async fn schema_version(&self) -> Result<u32> {
    self
      .conn
      .call(|conn| Ok(schema::schema_version(conn)))
      .await?
  }
}

// ─── KnowledgeStore impl ─────────────────────────────────────────────────────

impl KnowledgeStore for SqliteStore {
  type Error = Error;

  // ── Sync state ────────────────────────────────────────────────────────────

  async fn load_sync_state(&self) -> Result<Option<SyncState>> {
    self.conn.call(|conn| Ok(sync_state::load(conn))).await?
  }

  async fn upsert_sync_state(&self, state: SyncState) -> Result<()> {
    self
      .conn
      .call(move |conn| Ok(sync_state::upsert(conn, &state)))
      .await?
  }

  // ── Claims ────────────────────────────────────────────────────────────────

  async fn propose(
    &self,
    claim: NewClaim,
    repo_root: PathBuf,
  ) -> Result<PromotionResult> {
    let now = Utc::now();
    self
      .conn
      .call(move |conn| Ok(promote::propose(conn, &claim, &repo_root, now)))
      .await?
  }

  async fn link(&self, edge: NewEdge) -> Result<bool> {
    let now = Utc::now();
    self
      .conn
      .call(move |conn| Ok(promote::link(conn, &edge, now)))
      .await?
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn recall(
    &self,
    query: String,
    options: RecallOptions,
  ) -> Result<Vec<RecallHit>> {
    self
      .conn
      .call(move |conn| Ok(recall::recall(conn, &query, &options)))
      .await?
  }

  async fn orient(
    &self,
    probe: Arc<dyn RepoProbe>,
    options: OrientOptions,
  ) -> Result<OrientPayload> {
    self
      .conn
      .call(move |conn| Ok(orient::build(conn, probe.as_ref(), &options)))
      .await?
  }
}
