//! The orient payload: a freshness-checked summary of the repository and the
//! knowledge recorded about it, plus its plain-text rendering.

use std::{
  collections::HashSet,
  fmt::{self, Write as _},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  claim::{ClaimKind, Confidence, DriftStatus},
  freshness::Freshness,
  probe::{FileActivity, ModuleDescriptor},
  sync::SyncState,
};

/// Recent activity is always capped at this many files.
pub const RECENT_ACTIVITY_LIMIT: usize = 5;
/// Number of most recent commits inspected for module heat.
pub const HEAT_WINDOW_COMMITS: usize = 50;
/// A module touched more often than this within the window is hot.
pub const HOT_TOUCH_THRESHOLD: u32 = 5;
/// Modules, decisions and patterns listed when no limit is given.
pub const DEFAULT_LIST_CAP: usize = 50;
/// Dependency-flow clauses shown in the text view.
pub const MAX_FLOW_CLAUSES: usize = 8;

/// Parameters for [`crate::store::KnowledgeStore::orient`].
/// Zero means "use [`DEFAULT_LIST_CAP`]".
#[derive(Debug, Clone, Default)]
pub struct OrientOptions {
  pub module_root:   std::path::PathBuf,
  pub max_modules:   usize,
  pub max_decisions: usize,
}

impl OrientOptions {
  pub fn module_limit(&self) -> usize { cap(self.max_modules) }

  pub fn decision_limit(&self) -> usize { cap(self.max_decisions) }
}

fn cap(requested: usize) -> usize {
  if requested == 0 { DEFAULT_LIST_CAP } else { requested }
}

// ─── Heat ────────────────────────────────────────────────────────────────────

/// How recently and often a module has been changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Heat {
  Hot,
  Warm,
  Cold,
}

impl Heat {
  pub fn classify(touches: u32) -> Self {
    if touches > HOT_TOUCH_THRESHOLD {
      Self::Hot
    } else if touches > 0 {
      Self::Warm
    } else {
      Self::Cold
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Hot => "hot",
      Self::Warm => "warm",
      Self::Cold => "cold",
    }
  }
}

// ─── Payload ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
  pub files:     i64,
  pub symbols:   i64,
  pub packages:  i64,
  pub decisions: i64,
}

/// All imports from one package into other indexed packages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowEdge {
  pub from: String,
  pub to:   Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Architecture {
  pub entry_points:    Vec<String>,
  pub dependency_flow: Vec<FlowEdge>,
}

/// A claim linked to a module through a `package` edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Knowledge {
  pub kind:            ClaimKind,
  pub id:              i64,
  pub title:           String,
  pub confidence:      Confidence,
  pub relation:        String,
  pub edge_confidence: Confidence,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleSummary {
  pub path:       String,
  pub name:       String,
  pub file_count: i64,
  pub line_count: i64,
  pub touches:    u32,
  pub heat:       Heat,
  pub knowledge:  Vec<Knowledge>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionSummary {
  pub id:           i64,
  pub title:        String,
  pub reasoning:    String,
  pub confidence:   Confidence,
  pub drift_status: DriftStatus,
  pub updated_at:   DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternSummary {
  pub id:           i64,
  pub title:        String,
  pub description:  String,
  pub example:      Option<String>,
  pub confidence:   Confidence,
  pub drift_status: DriftStatus,
  pub updated_at:   DateTime<Utc>,
}

/// Everything `orient` reports, in one serialisable structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrientPayload {
  pub project:         ModuleDescriptor,
  pub architecture:    Architecture,
  pub freshness:       Freshness,
  pub last_sync:       Option<SyncState>,
  pub summary:         Summary,
  pub modules:         Vec<ModuleSummary>,
  pub decisions:       Vec<DecisionSummary>,
  pub patterns:        Vec<PatternSummary>,
  pub recent_activity: Vec<FileActivity>,
  pub warnings:        Vec<String>,
}

// ─── Text view ───────────────────────────────────────────────────────────────

/// Render the payload as plain text with a fixed section order.
pub fn render(payload: &OrientPayload) -> String {
  let mut out = String::new();
  // Writing into a String cannot fail.
  let _ = write_payload(&mut out, payload);
  out
}

fn write_payload(out: &mut String, p: &OrientPayload) -> fmt::Result {
  let module = if p.project.module.is_empty() {
    "(unknown module)"
  } else {
    &p.project.module
  };
  writeln!(out, "Project: {module} ({})", p.project.language)?;
  writeln!(out, "Root: {}", p.project.root.display())?;

  writeln!(out, "\nEntry points:")?;
  write_list(out, &p.architecture.entry_points, |out, entry| {
    writeln!(out, "- {entry}")
  })?;

  write_flow(out, &p.architecture.dependency_flow, &p.modules)?;

  if p.freshness.is_stale {
    writeln!(out, "\nStale context:")?;
    match &p.freshness.stale_summary {
      Some(summary) => writeln!(
        out,
        "- {} ({summary}); re-index before trusting module data",
        p.freshness.reason.describe()
      )?,
      None => writeln!(
        out,
        "- {}; re-index before trusting module data",
        p.freshness.reason.describe()
      )?,
    }
  }

  writeln!(
    out,
    "\nSummary: {} files, {} symbols, {} packages, {} decisions",
    p.summary.files, p.summary.symbols, p.summary.packages, p.summary.decisions
  )?;

  writeln!(out, "\nModules:")?;
  write_list(out, &p.modules, |out, m| {
    writeln!(
      out,
      "- {} [{}] {} files, {} lines",
      m.path,
      m.heat.as_str(),
      m.file_count,
      m.line_count
    )?;
    for k in &m.knowledge {
      if k.edge_confidence == k.confidence {
        writeln!(
          out,
          "  - {} #{} {} ({})",
          k.kind, k.id, k.title, k.confidence
        )?;
      } else {
        writeln!(
          out,
          "  - {} #{} {} ({}, link {})",
          k.kind, k.id, k.title, k.confidence, k.edge_confidence
        )?;
      }
    }
    Ok(())
  })?;

  writeln!(out, "\nActive decisions:")?;
  write_list(out, &p.decisions, |out, d| {
    writeln!(
      out,
      "- #{} {} [{}, drift {}]",
      d.id,
      d.title,
      d.confidence,
      d.drift_status.as_str()
    )?;
    if !d.reasoning.trim().is_empty() {
      writeln!(out, "  {}", d.reasoning.trim())?;
    }
    Ok(())
  })?;

  if !p.patterns.is_empty() {
    writeln!(out, "\nActive patterns:")?;
    for pat in &p.patterns {
      writeln!(
        out,
        "- #{} {} [{}, drift {}]",
        pat.id,
        pat.title,
        pat.confidence,
        pat.drift_status.as_str()
      )?;
    }
  }

  if !p.recent_activity.is_empty() {
    writeln!(out, "\nRecent activity:")?;
    for file in &p.recent_activity {
      writeln!(
        out,
        "- {} ({})",
        file.path,
        file.modified_at.format("%Y-%m-%d %H:%M")
      )?;
    }
  }

  if !p.warnings.is_empty() {
    writeln!(out, "\nWarnings:")?;
    for warning in &p.warnings {
      writeln!(out, "- {warning}")?;
    }
  }

  Ok(())
}

fn write_list<T>(
  out: &mut String,
  items: &[T],
  mut line: impl FnMut(&mut String, &T) -> fmt::Result,
) -> fmt::Result {
  if items.is_empty() {
    return writeln!(out, "- (none)");
  }
  for item in items {
    line(out, item)?;
  }
  Ok(())
}

/// Only edges between the listed modules are spelled out; the rest is
/// summarised as a count.
fn write_flow(
  out: &mut String,
  flow: &[FlowEdge],
  modules: &[ModuleSummary],
) -> fmt::Result {
  let total: usize = flow.iter().map(|edge| edge.to.len()).sum();
  if total == 0 {
    return Ok(());
  }

  writeln!(out, "\nDependency flow:")?;
  let listed: HashSet<&str> = modules.iter().map(|m| m.path.as_str()).collect();
  let mut shown = 0;
  let mut clauses = 0;

  for edge in flow {
    if clauses == MAX_FLOW_CLAUSES {
      break;
    }
    if !listed.contains(edge.from.as_str()) {
      continue;
    }
    let targets: Vec<&str> = edge
      .to
      .iter()
      .map(String::as_str)
      .filter(|to| listed.contains(to))
      .collect();
    match targets.as_slice() {
      [] => continue,
      [only] => writeln!(out, "- {} → {only}", edge.from)?,
      many => writeln!(out, "- {} → {{{}}}", edge.from, many.join(", "))?,
    }
    shown += targets.len();
    clauses += 1;
  }

  if shown == 0 {
    writeln!(out, "- {total} import edges, none between the listed modules")?;
  } else if total > shown {
    writeln!(out, "- (+{} more)", total - shown)?;
  }
  Ok(())
}
