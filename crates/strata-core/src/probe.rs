//! The live-repository collaborator.
//!
//! Freshness, heat, recent activity and project identity all come from
//! outside the store. Implementations are injected as a [`RepoProbe`] so
//! tests can substitute fixed or failing signals.

use std::{
  collections::HashMap,
  path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by a [`RepoProbe`].
#[derive(Debug, Error)]
pub enum ProbeError {
  #[error("`{command}` failed: {message}")]
  Command { command: String, message: String },

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("reading {path}: {source}")]
  Read {
    path:   String,
    #[source]
    source: std::io::Error,
  },

  #[error("unexpected output: {0}")]
  Parse(String),
}

/// Current head revision and working-tree dirtiness.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VcsState {
  /// Empty when there is no repository or no commit yet.
  pub head:  String,
  pub dirty: bool,
}

/// Change volume between two revisions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
  pub commits:       u64,
  pub files_changed: u64,
}

/// A tracked file and when it was last modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileActivity {
  pub path:        String,
  pub modified_at: DateTime<Utc>,
}

/// Project identity resolved from the module descriptor file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
  pub root:     PathBuf,
  /// Declared module path or package name.
  pub module:   String,
  pub language: String,
}

/// Read-only access to live repository signals.
///
/// Every call is synchronous and may spawn a process; there is no
/// cancellation path.
pub trait RepoProbe: Send + Sync {
  /// Resolve the project identity of the repository at `root`.
  fn describe_module(
    &self,
    root: &Path,
  ) -> Result<ModuleDescriptor, ProbeError>;

  /// Current head revision and dirty flag.
  fn vcs_state(&self, root: &Path) -> Result<VcsState, ProbeError>;

  /// Commit count and changed-file count between two revisions.
  fn diff_stats(
    &self,
    root: &Path,
    from: &str,
    to: &str,
  ) -> Result<DiffStats, ProbeError>;

  /// Content digest of the working tree.
  fn fingerprint(&self, root: &Path) -> Result<String, ProbeError>;

  /// Modification times of tracked files, in no particular order.
  fn file_activity(&self, root: &Path) -> Result<Vec<FileActivity>, ProbeError>;

  /// Number of commits among the most recent `window` that touched each
  /// directory, keyed by directory path (`.` for the root).
  fn touch_counts(
    &self,
    root: &Path,
    window: usize,
  ) -> Result<HashMap<String, u32>, ProbeError>;
}
