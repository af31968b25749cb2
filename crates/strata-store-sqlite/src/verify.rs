//! Running automated checks against the live repository and the index.

use std::{
  fs,
  path::{Component, Path},
};

use glob::{MatchOptions, Pattern};
use regex::Regex;
use rusqlite::Connection;
use strata_core::check::{Check, CheckOutcome};
use tracing::debug;

use crate::{Result, error::StepContext as _};

const DEFAULT_SCOPE: &str = "**/*";

/// A check with its pattern and glob compiled, so that malformed input is
/// rejected before any transaction opens.
#[derive(Debug)]
pub enum PreparedCheck {
  FileExists { path: String },
  SymbolExists { name: String },
  GrepPattern { regex: Regex, scope: String },
}

pub fn prepare(check: &Check) -> Result<PreparedCheck> {
  let invalid = |msg: String| strata_core::Error::InvalidCheck(msg);
  Ok(match check {
    Check::FileExists { path } => {
      confined("file_exists", "path", path)?;
      PreparedCheck::FileExists { path: path.clone() }
    }
    Check::SymbolExists { name } => {
      PreparedCheck::SymbolExists { name: name.clone() }
    }
    Check::GrepPattern { pattern, scope } => {
      let regex = Regex::new(pattern)
        .map_err(|e| {
          invalid(format!("grep_pattern: bad pattern {pattern:?}: {e}"))
        })?;
      let scope = if scope.trim().is_empty() {
        DEFAULT_SCOPE.to_owned()
      } else {
        scope.trim().to_owned()
      };
      confined("grep_pattern", "scope", &scope)?;
      Pattern::new(&scope)
        .map_err(|e| {
          invalid(format!("grep_pattern: bad scope {scope:?}: {e}"))
        })?;
      PreparedCheck::GrepPattern { regex, scope }
    }
  })
}

/// Check paths are relative to the repository root and may not leave it.
fn confined(check: &str, field: &str, value: &str) -> Result<()> {
  let escapes = value.starts_with('/')
    || Path::new(value).components().any(|c| {
      matches!(
        c,
        Component::ParentDir | Component::RootDir | Component::Prefix(_)
      )
    });
  if escapes {
    return Err(
      strata_core::Error::InvalidCheck(format!(
        "{check}: {field} {value:?} must stay inside the repository"
      ))
      .into(),
    );
  }
  Ok(())
}

/// Execute a prepared check. The outcome's details always name the path,
/// symbol or pattern that was checked.
pub fn run(
  conn: &Connection,
  root: &Path,
  check: &PreparedCheck,
) -> Result<CheckOutcome> {
  let outcome = match check {
    PreparedCheck::FileExists { path } => {
      if root.join(path).exists() {
        CheckOutcome::pass(format!("file exists: {path}"))
      } else {
        CheckOutcome::fail(format!("file not found: {path}"))
      }
    }
    PreparedCheck::SymbolExists { name } => {
      let matches: i64 = conn
        .query_row(
          "SELECT COUNT(*) FROM symbols WHERE name = ?1",
          rusqlite::params![name],
          |row| row.get(0),
        )
        .step("check symbol")?;
      if matches > 0 {
        CheckOutcome::pass(format!(
          "symbol found: {name} ({matches} definitions)"
        ))
      } else {
        CheckOutcome::fail(format!("symbol not found: {name}"))
      }
    }
    PreparedCheck::GrepPattern { regex, scope } => grep(root, regex, scope),
  };
  debug!(passed = outcome.passed, details = %outcome.details, "check finished");
  Ok(outcome)
}

fn grep(root: &Path, regex: &Regex, scope: &str) -> CheckOutcome {
  let pattern = format!("{}/{scope}", Pattern::escape(&root.to_string_lossy()));
  let options = MatchOptions {
    case_sensitive:              true,
    require_literal_separator:   true,
    require_literal_leading_dot: false,
  };

  let mut scanned = 0usize;
  // `prepare` already validated the scope, so a bad pattern here means the
  // root itself produced one; treat it as an empty scope.
  let entries = match glob::glob_with(&pattern, options) {
    Ok(paths) => paths,
    Err(_) => {
      return CheckOutcome::fail(format!(
        "pattern {:?} not found in scope {scope:?} (0 files scanned)",
        regex.as_str()
      ));
    }
  };

  for path in entries.flatten() {
    if !path.is_file() || in_git_dir(&path) {
      continue;
    }
    let Ok(contents) = fs::read_to_string(&path) else {
      continue;
    };
    scanned += 1;
    if let Some(line) = contents.lines().position(|line| regex.is_match(line)) {
      let shown = path.strip_prefix(root).unwrap_or(&path);
      return CheckOutcome::pass(format!(
        "pattern {:?} matched {}:{}",
        regex.as_str(),
        shown.display(),
        line + 1
      ));
    }
  }

  CheckOutcome::fail(format!(
    "pattern {:?} not found in scope {scope:?} ({scanned} files scanned)",
    regex.as_str()
  ))
}

fn in_git_dir(path: &Path) -> bool {
  path
    .components()
    .any(|c| matches!(c, Component::Normal(name) if name == ".git"))
}
