//! Include-directive expansion
//!
//! Supports three directive forms, each on its own line:
//! - `//= path` in scripts
//! - `/*= path */` in stylesheets
//! - `<!--= path -->` in markup
//!
//! Paths are resolved relative to the including file's directory. Included
//! files are expanded recursively with circular-include detection.

use crate::pipeline::transform::{Artifact, Transform, TransformError};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Text-rewrite stage expanding include directives.
pub struct Include;

impl Transform for Include {
    fn name(&self) -> &'static str {
        "include"
    }

    fn apply(&self, artifact: Artifact) -> Result<Vec<Artifact>, TransformError> {
        let text = artifact.text()?;
        let mut visited = HashSet::new();
        mark_visited(&artifact.meta.source_path, &mut visited);

        let expanded = expand(text, &artifact.meta.source_path, &mut visited)?;
        Ok(vec![Artifact::new(expanded.into_bytes(), artifact.meta)])
    }
}

/// Extract the include path from a directive line, if it is one.
fn directive_path(line: &str) -> Option<&str> {
    let trimmed = line.trim();

    if let Some(rest) = trimmed.strip_prefix("//=") {
        return Some(rest.trim());
    }
    if let Some(rest) = trimmed.strip_prefix("/*=") {
        return rest.strip_suffix("*/").map(str::trim);
    }
    if let Some(rest) = trimmed.strip_prefix("<!--=") {
        return rest.strip_suffix("-->").map(str::trim);
    }

    None
}

/// Recursively expand directives in `text`, which came from `source`.
fn expand(
    text: &str,
    source: &Path,
    visited: &mut HashSet<PathBuf>,
) -> Result<String, TransformError> {
    let base = source.parent().unwrap_or_else(|| Path::new("."));
    let mut out = String::with_capacity(text.len());

    for line in text.lines() {
        match directive_path(line) {
            Some(include_path) if !include_path.is_empty() => {
                let resolved = base.join(include_path);
                if !resolved.is_file() {
                    return Err(TransformError::IncludeNotFound(
                        include_path.to_string(),
                        source.to_path_buf(),
                    ));
                }

                let canonical = resolved
                    .canonicalize()
                    .unwrap_or_else(|_| resolved.clone());
                if !visited.insert(canonical.clone()) {
                    return Err(TransformError::CircularInclude(canonical));
                }

                let included = fs::read_to_string(&resolved).map_err(|e| {
                    TransformError::Read(resolved.clone(), e.to_string())
                })?;
                let nested = expand(&included, &resolved, visited)?;
                out.push_str(&nested);
                if !nested.ends_with('\n') {
                    out.push('\n');
                }

                // A file may be included again on a later sibling branch;
                // only a chain that reenters itself is circular
                visited.remove(&canonical);
            }
            _ => {
                out.push_str(line);
                out.push('\n');
            }
        }
    }

    Ok(out)
}

fn mark_visited(path: &Path, visited: &mut HashSet<PathBuf>) {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    visited.insert(canonical);
}
