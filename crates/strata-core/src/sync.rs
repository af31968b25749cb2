//! The singleton record of the last successful index run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Written by the external indexer after each successful sync; read-only to
/// the rest of the system. No row means the repository was never synced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
  pub last_sync_at:       DateTime<Utc>,
  /// VCS revision at sync time; empty outside a repository.
  pub last_sync_commit:   String,
  pub last_sync_dirty:    bool,
  pub indexed_file_count: i64,
  /// Opaque content digest of the working tree at sync time.
  pub index_fingerprint:  String,
}
