//! Content fingerprint of a set of working-tree files.

use std::{fs, io::ErrorKind, path::Path};

use sha2::{Digest as _, Sha256};
use strata_core::probe::ProbeError;

/// SHA-256 (hex) over the sorted, deduplicated `paths` and their contents.
///
/// A listed file that no longer exists contributes a tombstone rather than
/// failing, since a deletion is itself a change worth detecting. Any other
/// read error fails the whole fingerprint.
pub fn fingerprint_files(
  root: &Path,
  paths: impl IntoIterator<Item = String>,
) -> Result<String, ProbeError> {
  let mut paths: Vec<String> = paths.into_iter().collect();
  paths.sort();
  paths.dedup();

  let mut hasher = Sha256::new();
  for path in &paths {
    hasher.update(path.as_bytes());
    hasher.update([0u8]);

    let full = root.join(path);
    if full.is_dir() {
      // Submodule checkouts are listed as a single path.
      hasher.update(b"dir\0");
      continue;
    }
    match fs::read(&full) {
      Ok(bytes) => {
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(&bytes);
      }
      Err(e) if e.kind() == ErrorKind::NotFound => hasher.update(b"deleted\0"),
      Err(source) => {
        return Err(ProbeError::Read { path: path.clone(), source });
      }
    }
  }

  Ok(hex::encode(hasher.finalize()))
}
