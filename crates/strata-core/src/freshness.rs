//! The freshness oracle: is the stored index stale relative to the live
//! working tree?
//!
//! Signals are checked strongest first and the first mismatch wins. The
//! content fingerprint is the weakest signal; if it cannot be computed the
//! failure becomes a warning and the tree is treated as matching.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
  Error, Result,
  probe::{RepoProbe, VcsState},
  sync::SyncState,
};

/// Why the index is (or is not) considered stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleReason {
  NeverSynced,
  GitHeadChangedSinceLastSync,
  GitDirtyStateChangedSinceLastSync,
  WorktreeFingerprintChangedSinceLastSync,
  Fresh,
}

impl StaleReason {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::NeverSynced => "never_synced",
      Self::GitHeadChangedSinceLastSync => "git_head_changed_since_last_sync",
      Self::GitDirtyStateChangedSinceLastSync => {
        "git_dirty_state_changed_since_last_sync"
      }
      Self::WorktreeFingerprintChangedSinceLastSync => {
        "worktree_fingerprint_changed_since_last_sync"
      }
      Self::Fresh => "fresh",
    }
  }

  /// Short human phrasing for the text renderer.
  pub fn describe(self) -> &'static str {
    match self {
      Self::NeverSynced => "the index has never been synced",
      Self::GitHeadChangedSinceLastSync => "HEAD moved since the last sync",
      Self::GitDirtyStateChangedSinceLastSync => {
        "the working tree dirty state changed since the last sync"
      }
      Self::WorktreeFingerprintChangedSinceLastSync => {
        "working tree contents changed since the last sync"
      }
      Self::Fresh => "the index is up to date",
    }
  }
}

/// The oracle's verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Freshness {
  pub is_stale:      bool,
  pub reason:        StaleReason,
  /// `"N commits, M files changed"` when HEAD moved.
  pub stale_summary: Option<String>,
  pub current_head:  String,
  pub current_dirty: bool,
}

impl Freshness {
  fn verdict(reason: StaleReason, vcs: &VcsState) -> Self {
    if reason != StaleReason::Fresh {
      debug!(reason = reason.as_str(), head = %vcs.head, "index is stale");
    }
    Self {
      is_stale:      reason != StaleReason::Fresh,
      reason,
      stale_summary: None,
      current_head:  vcs.head.clone(),
      current_dirty: vcs.dirty,
    }
  }
}

/// Compare the persisted sync state against live repository signals.
///
/// Soft failures (fingerprint, diff summary) are pushed onto `warnings`;
/// failing to read the VCS state itself is an error.
pub fn assess(
  state: Option<&SyncState>,
  probe: &dyn RepoProbe,
  root: &Path,
  warnings: &mut Vec<String>,
) -> Result<Freshness> {
  let vcs = probe
    .vcs_state(root)
    .map_err(|source| Error::Probe { step: "read vcs state", source })?;

  let Some(state) = state else {
    return Ok(Freshness::verdict(StaleReason::NeverSynced, &vcs));
  };

  if state.last_sync_commit != vcs.head {
    let mut freshness =
      Freshness::verdict(StaleReason::GitHeadChangedSinceLastSync, &vcs);
    match probe.diff_stats(root, &state.last_sync_commit, &vcs.head) {
      Ok(stats) => {
        freshness.stale_summary = Some(format!(
          "{} commits, {} files changed",
          stats.commits, stats.files_changed
        ));
      }
      Err(e) => warnings.push(format!("stale summary unavailable: {e}")),
    }
    return Ok(freshness);
  }

  if state.last_sync_dirty != vcs.dirty {
    return Ok(Freshness::verdict(
      StaleReason::GitDirtyStateChangedSinceLastSync,
      &vcs,
    ));
  }

  match probe.fingerprint(root) {
    Ok(current) if current != state.index_fingerprint => {
      return Ok(Freshness::verdict(
        StaleReason::WorktreeFingerprintChangedSinceLastSync,
        &vcs,
      ));
    }
    Ok(_) => {}
    Err(e) => {
      warn!(error = %e, "fingerprint check failed; treating tree as unchanged");
      warnings.push(format!("fingerprint check failed: {e}"));
    }
  }

  debug!(head = %vcs.head, "index is fresh");
  Ok(Freshness::verdict(StaleReason::Fresh, &vcs))
}
