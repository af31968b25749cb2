//! [`GitProbe`] — repository signals from the `git` executable.

use std::{
  collections::{HashMap, HashSet},
  fs,
  path::Path,
  process::Command,
};

use chrono::{DateTime, Utc};
use strata_core::{
  RepoProbe,
  probe::{DiffStats, FileActivity, ModuleDescriptor, ProbeError, VcsState},
};
use tracing::debug;

use crate::{descriptor, fingerprint::fingerprint_files};

/// Separates commits in the `git log` output parsed by
/// [`parse_touch_counts`].
const COMMIT_MARKER: &str = "--strata-commit--";

/// Probe a working tree through `git -C <root> …`.
///
/// Stateless: the root is supplied on every call. Each call blocks on a
/// child process and has no timeout.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitProbe;

impl GitProbe {
  pub fn new() -> Self { Self }
}

fn git(root: &Path, args: &[&str]) -> Result<String, ProbeError> {
  let output = Command::new("git").arg("-C").arg(root).args(args).output()?;
  if !output.status.success() {
    return Err(ProbeError::Command {
      command: format!("git {}", args.join(" ")),
      message: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
    });
  }
  Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn inside_work_tree(root: &Path) -> Result<bool, ProbeError> {
  match git(root, &["rev-parse", "--is-inside-work-tree"]) {
    Ok(out) => Ok(out.trim() == "true"),
    Err(ProbeError::Command { .. }) => Ok(false),
    Err(e) => Err(e),
  }
}

/// `None` when the repository has no commits yet.
fn head(root: &Path) -> Result<Option<String>, ProbeError> {
  match git(root, &["rev-parse", "--verify", "--quiet", "HEAD"]) {
    Ok(out) => Ok(Some(out.trim().to_owned())),
    Err(ProbeError::Command { .. }) => Ok(None),
    Err(e) => Err(e),
  }
}

fn split_nul(out: &str) -> impl Iterator<Item = String> + '_ {
  out.split('\0').filter(|p| !p.is_empty()).map(str::to_owned)
}

fn parse_count(out: &str) -> Result<u64, ProbeError> {
  out
    .trim()
    .parse()
    .map_err(|_| {
      ProbeError::Parse(format!("expected a count, got {:?}", out.trim()))
    })
}

impl RepoProbe for GitProbe {
  fn describe_module(
    &self,
    root: &Path,
  ) -> Result<ModuleDescriptor, ProbeError> {
    descriptor::describe(root)
  }

  fn vcs_state(&self, root: &Path) -> Result<VcsState, ProbeError> {
    if !inside_work_tree(root)? {
      debug!(root = %root.display(), "not a git work tree");
      return Ok(VcsState::default());
    }
    let Some(head) = head(root)? else {
      return Ok(VcsState::default());
    };
    let status = git(root, &["status", "--porcelain"])?;
    Ok(VcsState { head, dirty: !status.trim().is_empty() })
  }

  fn diff_stats(
    &self,
    root: &Path,
    from: &str,
    to: &str,
  ) -> Result<DiffStats, ProbeError> {
    if to.is_empty() {
      return Err(ProbeError::Parse("no current commit to compare".to_owned()));
    }
    if from.is_empty() {
      // Never synced against a commit: everything up to `to` is new.
      let commits = parse_count(&git(root, &["rev-list", "--count", to])?)?;
      let files = git(root, &["ls-tree", "-r", "--name-only", "-z", to])?;
      return Ok(DiffStats {
        commits,
        files_changed: split_nul(&files).count() as u64,
      });
    }
    let range = format!("{from}..{to}");
    let counted = git(root, &["rev-list", "--count", range.as_str()])?;
    let commits = parse_count(&counted)?;
    let files = git(root, &["diff", "--name-only", "-z", from, to])?;
    Ok(DiffStats {
      commits,
      files_changed: split_nul(&files).count() as u64,
    })
  }

  fn fingerprint(&self, root: &Path) -> Result<String, ProbeError> {
    let listed = git(root, &[
      "ls-files",
      "-z",
      "--cached",
      "--others",
      "--exclude-standard",
    ])?;
    fingerprint_files(root, split_nul(&listed))
  }

  fn file_activity(
    &self,
    root: &Path,
  ) -> Result<Vec<FileActivity>, ProbeError> {
    if !inside_work_tree(root)? {
      return Ok(Vec::new());
    }
    let listed = git(root, &["ls-files", "-z"])?;
    let mut activity = Vec::new();
    for path in split_nul(&listed) {
      // Deleted-but-tracked files have no modification time.
      let modified = fs::metadata(root.join(&path)).and_then(|m| m.modified());
      let Ok(modified) = modified else {
        continue;
      };
      activity.push(FileActivity {
        path,
        modified_at: DateTime::<Utc>::from(modified),
      });
    }
    Ok(activity)
  }

  fn touch_counts(
    &self,
    root: &Path,
    window: usize,
  ) -> Result<HashMap<String, u32>, ProbeError> {
    if !inside_work_tree(root)? || head(root)?.is_none() {
      return Ok(HashMap::new());
    }
    let count = window.to_string();
    let format = format!("--format={COMMIT_MARKER}");
    let log = git(root, &[
      "log",
      "-n",
      count.as_str(),
      "--name-only",
      format.as_str(),
    ])?;
    Ok(parse_touch_counts(&log))
  }
}

/// Count, per directory, how many commits touched at least one file in it.
///
/// Expects `git log --name-only --format=<marker>` output. Files at the top
/// level count towards `.`.
pub fn parse_touch_counts(log: &str) -> HashMap<String, u32> {
  let mut counts = HashMap::new();
  let mut seen: HashSet<String> = HashSet::new();

  for line in log.lines().map(str::trim) {
    if line == COMMIT_MARKER {
      seen.clear();
      continue;
    }
    if line.is_empty() {
      continue;
    }
    let dir = match line.rsplit_once('/') {
      Some((dir, _)) => dir.to_owned(),
      None => ".".to_owned(),
    };
    if seen.insert(dir.clone()) {
      *counts.entry(dir).or_insert(0) += 1;
    }
  }
  counts
}
