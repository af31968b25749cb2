//! The auto-linker: find mentions of indexed code entities in free text.
//!
//! Paths (packages and files) are matched as plain substrings, longest
//! first, and each match is blanked out so a parent package is not linked
//! from the same occurrence as its nested child. Symbols are matched as
//! whole words and only when they are distinctive enough.

use std::collections::HashSet;

use crate::{
  claim::Confidence,
  edge::{LinkCandidate, TargetType},
};

/// Symbols shorter than this are never linked.
pub const MIN_SYMBOL_LEN: usize = 6;

/// Exported names too generic to link on sight.
const GENERIC_SYMBOLS: &[&str] = &[
  "String", "Error", "Close", "Config", "Handle", "Handler", "Update",
  "Create", "Delete", "Result", "Context", "Options", "Default", "Status",
  "Format", "Reader", "Writer", "Client", "Server", "Request", "Response",
  "Message", "Service", "Manager", "Execute", "Process", "Validate", "Values",
  "Params", "Parse", "Value", "Setup", "Start", "Stop", "Register",
  "Initialize",
];

/// An exported symbol known to the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownSymbol {
  pub package: String,
  pub name:    String,
}

/// Matches text against the packages, files and symbols of one index
/// snapshot.
#[derive(Debug, Clone, Default)]
pub struct AutoLinker {
  /// Package and file paths, longest first.
  paths:   Vec<(TargetType, String)>,
  symbols: Vec<KnownSymbol>,
}

impl AutoLinker {
  pub fn new(
    packages: impl IntoIterator<Item = String>,
    files: impl IntoIterator<Item = String>,
    symbols: impl IntoIterator<Item = KnownSymbol>,
  ) -> Self {
    let mut paths: Vec<(TargetType, String)> = packages
      .into_iter()
      .map(|p| (TargetType::Package, p))
      .chain(files.into_iter().map(|f| (TargetType::File, f)))
      .filter(|(_, p)| !p.is_empty() && p != ".")
      .collect();
    paths.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.1.cmp(&b.1)));

    let symbols = symbols
      .into_iter()
      .filter(|s| is_distinctive(&s.name))
      .collect();

    Self { paths, symbols }
  }

  /// Candidate edges for every entity mentioned in `text`, deduplicated by
  /// target type and reference.
  pub fn detect(&self, text: &str) -> Vec<LinkCandidate> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let mut masked = text.to_owned();

    for (to_type, path) in &self.paths {
      let mut matched = false;
      while let Some(start) = masked.find(path.as_str()) {
        let blank = " ".repeat(path.len());
        masked.replace_range(start..start + path.len(), &blank);
        matched = true;
      }
      if matched && seen.insert((*to_type, path.clone())) {
        out.push(LinkCandidate {
          to_type:    *to_type,
          to_ref:     path.clone(),
          relation:   "affects",
          confidence: Confidence::Medium,
        });
      }
    }

    for symbol in &self.symbols {
      if !contains_word(text, &symbol.name) {
        continue;
      }
      let to_ref = format!("{}.{}", symbol.package, symbol.name);
      if seen.insert((TargetType::Symbol, to_ref.clone())) {
        out.push(LinkCandidate {
          to_type: TargetType::Symbol,
          to_ref,
          relation: "references",
          confidence: Confidence::Low,
        });
      }
    }

    out
  }
}

fn is_distinctive(name: &str) -> bool {
  name.chars().count() >= MIN_SYMBOL_LEN && !GENERIC_SYMBOLS.contains(&name)
}

fn is_word_char(c: char) -> bool { c.is_alphanumeric() || c == '_' }

/// Whether `word` occurs in `text` bounded on both sides by a non-word
/// character or the edge of the string.
pub fn contains_word(text: &str, word: &str) -> bool {
  if word.is_empty() {
    return false;
  }
  text.match_indices(word).any(|(start, _)| {
    let end = start + word.len();
    let before_ok = text[..start]
      .chars()
      .next_back()
      .is_none_or(|c| !is_word_char(c));
    let after_ok = text[end..].chars().next().is_none_or(|c| !is_word_char(c));
    before_ok && after_ok
  })
}
