//! Project identity from module descriptor files.

use std::{fs, path::Path};

use strata_core::probe::{ModuleDescriptor, ProbeError};
use tracing::debug;

/// Resolve the module name and primary language of the project at `root`.
///
/// Descriptors are tried in a fixed order: `go.mod`, `Cargo.toml`,
/// `package.json`, `pyproject.toml`. Without any of them the directory name
/// is used and the language is `unknown`.
pub fn describe(root: &Path) -> Result<ModuleDescriptor, ProbeError> {
  let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
  let dir_name = root
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_default();

  let detected = if let Some(raw) = read_optional(&root, "go.mod")? {
    go_module(&raw).map(|m| (m, "go"))
  } else if let Some(raw) = read_optional(&root, "Cargo.toml")? {
    let table = parse_toml("Cargo.toml", &raw)?;
    Some((
      toml_str(&table, &["package", "name"])
        .unwrap_or_else(|| dir_name.clone()),
      "rust",
    ))
  } else if let Some(raw) = read_optional(&root, "package.json")? {
    let json: serde_json::Value = serde_json::from_str(&raw)
      .map_err(|e| ProbeError::Parse(format!("package.json: {e}")))?;
    let name = json
      .get("name")
      .and_then(|n| n.as_str())
      .map(str::to_owned)
      .unwrap_or_else(|| dir_name.clone());
    let language = if root.join("tsconfig.json").exists() {
      "typescript"
    } else {
      "javascript"
    };
    Some((name, language))
  } else if let Some(raw) = read_optional(&root, "pyproject.toml")? {
    let table = parse_toml("pyproject.toml", &raw)?;
    Some((
      toml_str(&table, &["project", "name"])
        .or_else(|| toml_str(&table, &["tool", "poetry", "name"]))
        .unwrap_or_else(|| dir_name.clone()),
      "python",
    ))
  } else {
    None
  };

  let (module, language) = detected.unwrap_or((dir_name, "unknown"));
  debug!(%module, language, "module resolved");
  Ok(ModuleDescriptor {
    root,
    module,
    language: language.to_owned(),
  })
}

fn read_optional(
  root: &Path,
  name: &str,
) -> Result<Option<String>, ProbeError> {
  match fs::read_to_string(root.join(name)) {
    Ok(raw) => Ok(Some(raw)),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
    Err(source) => Err(ProbeError::Read { path: name.to_owned(), source }),
  }
}

fn go_module(raw: &str) -> Option<String> {
  raw.lines().find_map(|line| {
    let rest = line.trim().strip_prefix("module")?;
    let name = rest.trim().trim_matches('"');
    let declared = !name.is_empty() && rest.starts_with(char::is_whitespace);
    declared.then(|| name.to_owned())
  })
}

fn parse_toml(file: &str, raw: &str) -> Result<toml::Table, ProbeError> {
  raw
    .parse::<toml::Table>()
    .map_err(|e| ProbeError::Parse(format!("{file}: {e}")))
}

fn toml_str(table: &toml::Table, keys: &[&str]) -> Option<String> {
  let (last, parents) = keys.split_last()?;
  let mut current = table;
  for key in parents {
    current = current.get(*key)?.as_table()?;
  }
  current.get(*last)?.as_str().map(str::to_owned)
}
