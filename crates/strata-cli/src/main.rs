//! `strata` — record, verify and recall knowledge about a repository.
//!
//! # Usage
//!
//! ```
//! strata orient
//! strata decide --title "Errors wrap ExitError" --body "..." \
//!   --evidence "every command returns one" \
//!   --check-type symbol_exists --check-spec '{"name":"ExitError"}'
//! strata recall "exit codes"
//! ```

mod config;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use strata_core::{
  check::CheckDescriptor,
  claim::{ClaimKind, Confidence, NewClaim, PromotionResult},
  edge::{NewEdge, TargetType},
  orient::{self, OrientOptions},
  recall::{MatchMode, RecallHit, RecallOptions},
  store::KnowledgeStore,
};
use strata_repo::GitProbe;
use strata_store_sqlite::{Migrator, SqliteStore};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
  name = "strata",
  author,
  version,
  about = "Verified knowledge store for a source repository"
)]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, global = true, default_value = "strata.toml")]
  config: PathBuf,

  /// SQLite database file (overrides `store_path`).
  #[arg(long, global = true, value_name = "FILE")]
  store: Option<PathBuf>,

  /// Repository root (overrides `repo_root`).
  #[arg(long, global = true, value_name = "DIR")]
  repo: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Apply pending schema migrations and print the schema version.
  Migrate,

  /// Print a freshness-checked summary of the repository and its knowledge.
  Orient {
    #[arg(long)]
    json:          bool,
    #[arg(long)]
    max_modules:   Option<usize>,
    #[arg(long)]
    max_decisions: Option<usize>,
  },

  /// Look up active decisions and patterns by keyword.
  Recall {
    /// Full-text query; falls back to substring matching when the query is
    /// not valid full-text syntax.
    query: String,
    #[arg(long)]
    limit: Option<usize>,
    /// `decision` or `pattern`.
    #[arg(long)]
    kind:  Option<ClaimKind>,
    #[arg(long)]
    json:  bool,
  },

  /// Propose a design decision.
  Decide(ClaimArgs),

  /// Propose a recurring code pattern.
  Pattern {
    #[command(flatten)]
    claim:   ClaimArgs,
    /// Example snippet.
    #[arg(long)]
    example: Option<String>,
  },

  /// Add a manual edge from a decision or pattern.
  Link {
    /// `decision` or `pattern`.
    #[arg(long)]
    from_kind:  ClaimKind,
    #[arg(long)]
    from_id:    i64,
    /// `package`, `file`, `symbol`, `decision` or `pattern`.
    #[arg(long)]
    to_type:    TargetType,
    /// Path, `<package>.<symbol>`, or claim id.
    #[arg(long)]
    to_ref:     String,
    #[arg(long, default_value = "affects")]
    relation:   String,
    #[arg(long, default_value = "medium")]
    confidence: Confidence,
  },

  /// Print the persisted sync state.
  SyncState {
    #[arg(long)]
    json: bool,
  },
}

#[derive(Args, Debug)]
struct ClaimArgs {
  #[arg(long)]
  title:      String,
  /// Reasoning (decisions) or description (patterns).
  #[arg(long, default_value = "")]
  body:       String,
  /// Why the claim holds. Required.
  #[arg(long)]
  evidence:   String,
  /// `low`, `medium` or `high`; blank means `medium`.
  #[arg(long, default_value = "")]
  confidence: String,
  /// `file_exists`, `symbol_exists` or `grep_pattern`.
  #[arg(long)]
  check_type: String,
  /// Check parameters as a JSON object, e.g. `{"path":"go.mod"}`.
  #[arg(long)]
  check_spec: String,
  #[arg(long)]
  json:       bool,
}

impl ClaimArgs {
  fn into_claim(
    self,
    kind: ClaimKind,
    example: Option<String>,
  ) -> anyhow::Result<(NewClaim, bool)> {
    let spec: serde_json::Value = serde_json::from_str(&self.check_spec)
      .context("--check-spec is not valid JSON")?;
    let claim = NewClaim {
      kind,
      title: self.title,
      body: self.body,
      example,
      confidence: Confidence::parse_or_default(&self.confidence)?,
      evidence: self.evidence,
      check: CheckDescriptor::new(self.check_type, spec),
    };
    Ok((claim, self.json))
  }
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Logs go to stderr; stdout carries command output.
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let mut settings = config::load(&cli.config)?;
  if let Some(store) = cli.store {
    settings.store_path = store;
  }
  if let Some(repo) = cli.repo {
    settings.repo_root = repo;
  }

  if let Some(parent) = settings.store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {}", parent.display()))?;
  }
  let store = SqliteStore::open(&settings.store_path)
    .await
    .with_context(|| {
      format!("failed to open store at {:?}", settings.store_path)
    })?;

  match cli.command {
    Command::Migrate => {
      let version = store
        .migrate(Migrator::standard())
        .await
        .context("migration failed")?;
      println!("schema at version {version}");
    }

    Command::Orient { json, max_modules, max_decisions } => {
      let options = OrientOptions {
        module_root:   settings.repo_root.clone(),
        max_modules:   max_modules.unwrap_or(settings.max_modules),
        max_decisions: max_decisions.unwrap_or(settings.max_decisions),
      };
      let payload = store
        .orient(Arc::new(GitProbe::new()), options)
        .await
        .context("orient failed")?;
      if json {
        println!("{}", serde_json::to_string_pretty(&payload)?);
      } else {
        print!("{}", orient::render(&payload));
      }
    }

    Command::Recall { query, limit, kind, json } => {
      let options = RecallOptions {
        limit: limit.unwrap_or(settings.recall_limit),
        kind,
      };
      let hits = store.recall(query, options).await.context("recall failed")?;
      if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
      } else {
        print_hits(&hits);
      }
    }

    Command::Decide(args) => {
      let (claim, json) = args.into_claim(ClaimKind::Decision, None)?;
      let result = store
        .propose(claim, settings.repo_root.clone())
        .await
        .context("proposing decision failed")?;
      print_promotion(ClaimKind::Decision, &result, json)?;
    }

    Command::Pattern { claim, example } => {
      let (claim, json) = claim.into_claim(ClaimKind::Pattern, example)?;
      let result = store
        .propose(claim, settings.repo_root.clone())
        .await
        .context("proposing pattern failed")?;
      print_promotion(ClaimKind::Pattern, &result, json)?;
    }

    Command::Link {
      from_kind,
      from_id,
      to_type,
      to_ref,
      relation,
      confidence,
    } => {
      let edge = NewEdge {
        from_type: from_kind,
        from_id,
        to_type,
        to_ref,
        relation,
        confidence,
      };
      let inserted = store.link(edge).await.context("link failed")?;
      if inserted {
        println!("linked");
      } else {
        println!("edge already present");
      }
    }

    Command::SyncState { json } => {
      let state = store
        .load_sync_state()
        .await
        .context("loading sync state failed")?;
      match (state, json) {
        (state, true) => println!("{}", serde_json::to_string_pretty(&state)?),
        (None, false) => println!("never synced"),
        (Some(s), false) => {
          println!("last sync:   {}", s.last_sync_at.to_rfc3339());
          println!("commit:      {}", or_dash(&s.last_sync_commit));
          println!("dirty:       {}", s.last_sync_dirty);
          println!("files:       {}", s.indexed_file_count);
          println!("fingerprint: {}", or_dash(&s.index_fingerprint));
        }
      }
    }
  }

  Ok(())
}

// ─── Output ──────────────────────────────────────────────────────────────────

fn or_dash(s: &str) -> &str { if s.is_empty() { "-" } else { s } }

fn print_promotion(
  kind: ClaimKind,
  result: &PromotionResult,
  json: bool,
) -> anyhow::Result<()> {
  if json {
    println!("{}", serde_json::to_string_pretty(result)?);
    return Ok(());
  }
  match result.entity_id {
    Some(id) if result.promoted => println!(
      "promoted {kind} #{id} ({} edge{} linked)",
      result.linked_edges,
      if result.linked_edges == 1 { "" } else { "s" }
    ),
    _ => println!(
      "not promoted; proposal #{} left pending",
      result.proposal_id
    ),
  }
  println!("verification: {}", result.verification_details);
  Ok(())
}

fn print_hits(hits: &[RecallHit]) {
  if hits.is_empty() {
    println!("no matches");
    return;
  }
  for hit in hits {
    let via = match hit.matched_by {
      MatchMode::FullText => "full-text",
      MatchMode::Substring => "substring",
    };
    println!(
      "{} #{} {} ({}, {via})",
      hit.kind, hit.id, hit.title, hit.confidence
    );
    if !hit.body.is_empty() {
      println!("  {}", hit.body);
    }
    if let Some(summary) = &hit.evidence_summary {
      let drift = hit.drift_status.unwrap_or_default();
      println!("  evidence: {summary} [{}]", drift.as_str());
    }
    for edge in &hit.edges {
      println!("  → {} {} ({})", edge.to_type, edge.to_ref, edge.relation);
    }
  }
}
