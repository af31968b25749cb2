//! Automated checks that gate claim promotion.
//!
//! Callers hand in a loosely-typed [`CheckDescriptor`] (a type name plus a
//! JSON parameter object). It is resolved into a typed [`Check`] during
//! validation; the raw spec is what gets persisted with the proposal.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// The raw check as supplied by a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckDescriptor {
  /// One of `file_exists`, `symbol_exists`, `grep_pattern`.
  pub check_type: String,
  /// Structured parameters keyed by check type.
  pub spec:       serde_json::Value,
}

impl CheckDescriptor {
  pub fn new(check_type: impl Into<String>, spec: serde_json::Value) -> Self {
    Self { check_type: check_type.into(), spec }
  }

  /// Resolve into a typed [`Check`], rejecting blank or malformed input.
  pub fn resolve(&self) -> Result<Check> {
    let check_type = self.check_type.trim();
    if check_type.is_empty() {
      return Err(Error::MissingField("check type"));
    }
    let spec_missing = match &self.spec {
      serde_json::Value::Null => true,
      serde_json::Value::Object(map) => map.is_empty(),
      _ => false,
    };
    if spec_missing {
      return Err(Error::MissingField("check spec"));
    }

    let check = Check::from_parts(check_type, self.spec.clone())?;
    check.require_subject()?;
    Ok(check)
  }
}

/// A resolved automated check. The variant name is the `check_type`
/// discriminant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "spec", rename_all = "snake_case")]
pub enum Check {
  /// Passes when `path` (relative to the repository root) exists.
  FileExists { path: String },
  /// Passes when a symbol called `name` is present in the index.
  SymbolExists { name: String },
  /// Passes when `pattern` (a regular expression) matches a line in any
  /// file selected by the `scope` glob. An empty scope means every file.
  GrepPattern {
    pattern: String,
    #[serde(default)]
    scope:   String,
  },
}

impl Check {
  /// Must match the `rename_all = "snake_case"` serde tags above.
  pub fn discriminant(&self) -> &'static str {
    match self {
      Self::FileExists { .. } => "file_exists",
      Self::SymbolExists { .. } => "symbol_exists",
      Self::GrepPattern { .. } => "grep_pattern",
    }
  }

  /// Build from a discriminant and its parameter object.
  pub fn from_parts(check_type: &str, spec: serde_json::Value) -> Result<Self> {
    let wrapped = serde_json::json!({ "type": check_type, "spec": spec });
    serde_json::from_value(wrapped)
      .map_err(|e| Error::InvalidCheck(format!("{check_type}: {e}")))
  }

  /// The concrete thing being checked: a path, a symbol name or a pattern.
  pub fn subject(&self) -> &str {
    match self {
      Self::FileExists { path } => path,
      Self::SymbolExists { name } => name,
      Self::GrepPattern { pattern, .. } => pattern,
    }
  }

  fn require_subject(&self) -> Result<()> {
    if self.subject().trim().is_empty() {
      let field = match self {
        Self::FileExists { .. } => "path",
        Self::SymbolExists { .. } => "name",
        Self::GrepPattern { .. } => "pattern",
      };
      return Err(Error::InvalidCheck(format!(
        "{}: `{field}` must not be empty",
        self.discriminant()
      )));
    }
    Ok(())
  }
}

/// The result of running a check against the live repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
  pub passed:  bool,
  /// Always names the concrete subject checked.
  pub details: String,
}

impl CheckOutcome {
  pub fn pass(details: impl Into<String>) -> Self {
    Self { passed: true, details: details.into() }
  }

  pub fn fail(details: impl Into<String>) -> Self {
    Self { passed: false, details: details.into() }
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn resolves_each_check_type() {
    let file = CheckDescriptor::new("file_exists", json!({ "path": "go.mod" }));
    assert_eq!(file.resolve().unwrap(), Check::FileExists {
      path: "go.mod".into(),
    });

    let symbol =
      CheckDescriptor::new("symbol_exists", json!({ "name": "ExitError" }));
    assert_eq!(symbol.resolve().unwrap().subject(), "ExitError");

    let grep = CheckDescriptor::new(
      "grep_pattern",
      json!({ "pattern": "slog\\.", "scope": "internal/**/*.go" }),
    );
    assert!(matches!(
      grep.resolve().unwrap(),
      Check::GrepPattern { ref scope, .. } if scope == "internal/**/*.go"
    ));
  }

  #[test]
  fn grep_scope_is_optional() {
    let grep =
      CheckDescriptor::new("grep_pattern", json!({ "pattern": "TODO" }));
    assert!(matches!(
      grep.resolve().unwrap(),
      Check::GrepPattern { ref scope, .. } if scope.is_empty()
    ));
  }

  #[test]
  fn missing_type_and_spec_are_named() {
    let no_type = CheckDescriptor::new(" ", json!({ "path": "x" }));
    assert!(matches!(
      no_type.resolve(),
      Err(Error::MissingField("check type"))
    ));

    let no_spec = CheckDescriptor::new("file_exists", json!({}));
    assert!(matches!(
      no_spec.resolve(),
      Err(Error::MissingField("check spec"))
    ));

    let null_spec =
      CheckDescriptor::new("file_exists", serde_json::Value::Null);
    assert!(matches!(
      null_spec.resolve(),
      Err(Error::MissingField("check spec"))
    ));
  }

  #[test]
  fn malformed_specs_are_invalid() {
    let unknown = CheckDescriptor::new("url_reachable", json!({ "url": "x" }));
    assert!(matches!(unknown.resolve(), Err(Error::InvalidCheck(_))));

    let wrong_field =
      CheckDescriptor::new("file_exists", json!({ "name": "x" }));
    assert!(matches!(wrong_field.resolve(), Err(Error::InvalidCheck(_))));

    let blank = CheckDescriptor::new("symbol_exists", json!({ "name": "" }));
    assert!(matches!(blank.resolve(), Err(Error::InvalidCheck(_))));
  }
}
