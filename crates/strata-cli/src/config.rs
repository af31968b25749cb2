//! Layered settings: built-in defaults, an optional TOML file, then
//! `STRATA_*` environment variables. Command-line flags are applied on top
//! by the caller.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  /// SQLite database file. A leading `~/` is expanded.
  pub store_path:    PathBuf,
  /// Repository the probe and the checks run against.
  pub repo_root:     PathBuf,
  /// 0 means the built-in cap.
  pub max_modules:   usize,
  /// 0 means the built-in cap.
  pub max_decisions: usize,
  pub recall_limit:  usize,
}

pub fn load(file: &Path) -> anyhow::Result<Settings> {
  let settings = config::Config::builder()
    .set_default("store_path", ".strata/index.db")?
    .set_default("repo_root", ".")?
    .set_default("max_modules", 0_i64)?
    .set_default("max_decisions", 0_i64)?
    .set_default("recall_limit", 10_i64)?
    .add_source(config::File::from(file).required(false))
    .add_source(config::Environment::with_prefix("STRATA").try_parsing(true))
    .build()
    .with_context(|| format!("failed to read config file {}", file.display()))?;

  let mut settings: Settings = settings
    .try_deserialize()
    .context("failed to deserialise settings")?;
  settings.store_path = expand_tilde(&settings.store_path);
  settings.repo_root = expand_tilde(&settings.repo_root);
  Ok(settings)
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_without_a_file() {
    let settings = load(Path::new("/nonexistent/strata.toml")).unwrap();
    assert_eq!(settings.repo_root, PathBuf::from("."));
    assert_eq!(settings.recall_limit, 10);
    assert_eq!(settings.max_modules, 0);
  }

  #[test]
  fn file_overrides_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("strata.toml");
    std::fs::write(
      &file,
      "recall_limit = 3\nstore_path = \"db/strata.db\"\n",
    )
    .unwrap();

    let settings = load(&file).unwrap();
    assert_eq!(settings.recall_limit, 3);
    assert_eq!(settings.store_path, PathBuf::from("db/strata.db"));
  }

  #[test]
  fn tilde_is_expanded() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(
      expand_tilde(Path::new("~/strata/index.db")),
      PathBuf::from(home).join("strata/index.db")
    );
    assert_eq!(
      expand_tilde(Path::new("rel/index.db")),
      PathBuf::from("rel/index.db")
    );
  }
}
