//! Load and upsert the singleton `sync_state` row.

use rusqlite::{Connection, OptionalExtension as _};
use strata_core::sync::SyncState;

use crate::{
  Result,
  encode::{decode_dt, encode_dt},
  error::StepContext as _,
};

struct RawSyncState {
  last_sync_at:       String,
  last_sync_commit:   String,
  last_sync_dirty:    bool,
  indexed_file_count: i64,
  index_fingerprint:  String,
}

/// `None` means the index was never synced. An unparseable timestamp is a
/// hard error, not "never synced".
pub fn load(conn: &Connection) -> Result<Option<SyncState>> {
  let raw = conn
    .query_row(
      "SELECT last_sync_at, last_sync_commit, last_sync_dirty,
              indexed_file_count, index_fingerprint
       FROM sync_state WHERE id = 1",
      [],
      |row| {
        Ok(RawSyncState {
          last_sync_at:       row.get(0)?,
          last_sync_commit:   row.get(1)?,
          last_sync_dirty:    row.get(2)?,
          indexed_file_count: row.get(3)?,
          index_fingerprint:  row.get(4)?,
        })
      },
    )
    .optional()
    .step("load sync state")?;

  raw
    .map(|raw| {
      Ok(SyncState {
        last_sync_at:       decode_dt(&raw.last_sync_at)?,
        last_sync_commit:   raw.last_sync_commit,
        last_sync_dirty:    raw.last_sync_dirty,
        indexed_file_count: raw.indexed_file_count,
        index_fingerprint:  raw.index_fingerprint,
      })
    })
    .transpose()
}

pub fn upsert(conn: &Connection, state: &SyncState) -> Result<()> {
  conn
    .execute(
      "INSERT INTO sync_state (
         id, last_sync_at, last_sync_commit, last_sync_dirty,
         indexed_file_count, index_fingerprint
       ) VALUES (1, ?1, ?2, ?3, ?4, ?5)
       ON CONFLICT(id) DO UPDATE SET
         last_sync_at       = excluded.last_sync_at,
         last_sync_commit   = excluded.last_sync_commit,
         last_sync_dirty    = excluded.last_sync_dirty,
         indexed_file_count = excluded.indexed_file_count,
         index_fingerprint  = excluded.index_fingerprint",
      rusqlite::params![
        encode_dt(state.last_sync_at),
        state.last_sync_commit,
        state.last_sync_dirty,
        state.indexed_file_count,
        state.index_fingerprint,
      ],
    )
    .step("upsert sync state")?;
  Ok(())
}
