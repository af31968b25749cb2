//! The `KnowledgeStore` trait.
//!
//! Implemented by storage backends (e.g. `strata-store-sqlite`). The CLI
//! depends on this abstraction, not on any concrete backend.

use std::{future::Future, path::PathBuf, sync::Arc};

use crate::{
  claim::{NewClaim, PromotionResult},
  edge::NewEdge,
  orient::{OrientOptions, OrientPayload},
  probe::RepoProbe,
  recall::{RecallHit, RecallOptions},
  sync::SyncState,
};

/// Abstraction over a Strata knowledge store backend.
///
/// Each method is one self-contained operation: there is no state shared
/// between calls beyond the store itself, and nothing is retried.
pub trait KnowledgeStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Sync state ────────────────────────────────────────────────────────

  /// The last successful index run, or `None` if the index was never
  /// synced.
  fn load_sync_state(
    &self,
  ) -> impl Future<Output = Result<Option<SyncState>, Self::Error>> + Send + '_;

  /// Record a successful index run (insert or replace the singleton row).
  fn upsert_sync_state(
    &self,
    state: SyncState,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Claims ────────────────────────────────────────────────────────────

  /// Verify a proposed claim against the repository at `repo_root` and
  /// promote it to `active` if the check passes.
  fn propose(
    &self,
    claim: NewClaim,
    repo_root: PathBuf,
  ) -> impl Future<Output = Result<PromotionResult, Self::Error>> + Send + '_;

  /// Record a manual edge from an existing claim. Returns `false` when an
  /// identical edge was already present.
  fn link(
    &self,
    edge: NewEdge,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Keyword lookup over active claims, enriched with their edges.
  fn recall(
    &self,
    query: String,
    options: RecallOptions,
  ) -> impl Future<Output = Result<Vec<RecallHit>, Self::Error>> + Send + '_;

  /// Assemble the orient payload using `probe` for live repository signals.
  fn orient(
    &self,
    probe: Arc<dyn RepoProbe>,
    options: OrientOptions,
  ) -> impl Future<Output = Result<OrientPayload, Self::Error>> + Send + '_;
}
