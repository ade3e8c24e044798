//! Transform stages and the per-file artifact model.
//!
//! A transform is a stateless stage `Artifact -> Vec<Artifact>`; a pipeline
//! applies its chain left to right, each stage consuming every artifact the
//! previous stage produced. A stage may return zero artifacts (drop the file),
//! one (the usual rewrite), or two (e.g. a passthrough plus a `.min` variant).

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error from a single transform stage applied to a single file.
#[derive(Debug, Clone, Error, PartialEq)]
#[non_exhaustive]
pub enum TransformError {
    /// Source file could not be read
    #[error("failed to read {}: {1}", .0.display())]
    Read(PathBuf, String),
    /// Output file could not be written
    #[error("failed to write {}: {1}", .0.display())]
    Write(PathBuf, String),
    /// Text stage applied to content that is not valid UTF-8
    #[error("{} is not valid UTF-8: {1}", .0.display())]
    Encoding(PathBuf, String),
    /// Include directive points at a missing file
    #[error("include '{0}' not found (from {})", .1.display())]
    IncludeNotFound(String, PathBuf),
    /// Circular include chain
    #[error("circular include detected: {}", .0.display())]
    CircularInclude(PathBuf),
    /// Stage-specific failure (parse error, codec error)
    #[error("{0} stage: {1}")]
    Stage(String, String),
}

/// Per-file path bookkeeping, derived when a source file is matched.
///
/// Rename-type transforms mutate `relative_path` and `dest_path` only;
/// `source_path` always names the matched input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    /// Path relative to the pipeline's base, preserved in the output tree
    pub relative_path: PathBuf,
    /// Absolute path of the matched source file
    pub source_path: PathBuf,
    /// Absolute path the artifact will be written to
    pub dest_path: PathBuf,
}

impl FileMeta {
    /// Derive metadata for a matched source file.
    pub fn derive(source_path: &Path, base: &Path, dest_root: &Path) -> Self {
        let relative_path = source_path
            .strip_prefix(base)
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|_| {
                source_path
                    .file_name()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| source_path.to_path_buf())
            });
        let dest_path = dest_root.join(&relative_path);
        Self { relative_path, source_path: source_path.to_path_buf(), dest_path }
    }

    /// Insert a suffix before the final extension: `app.js` -> `app.min.js`.
    pub fn with_suffix(&self, suffix: &str) -> Self {
        let stem = self
            .relative_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let renamed = match self.relative_path.extension() {
            Some(ext) => format!("{}{}.{}", stem, suffix, ext.to_string_lossy()),
            None => format!("{}{}", stem, suffix),
        };
        let relative_path = self.relative_path.with_file_name(&renamed);
        let dest_path = self.dest_path.with_file_name(&renamed);
        Self { relative_path, source_path: self.source_path.clone(), dest_path }
    }
}

/// One unit of content flowing through a transform chain.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// File content
    pub content: Vec<u8>,
    /// Path bookkeeping for this artifact
    pub meta: FileMeta,
}

impl Artifact {
    /// Create an artifact from content and metadata.
    pub fn new(content: Vec<u8>, meta: FileMeta) -> Self {
        Self { content, meta }
    }

    /// Interpret the content as UTF-8 text.
    pub fn text(&self) -> Result<&str, TransformError> {
        std::str::from_utf8(&self.content)
            .map_err(|e| TransformError::Encoding(self.meta.source_path.clone(), e.to_string()))
    }
}

/// A stateless transform stage.
///
/// Implementations must not retain state between calls; the executor may
/// apply one stage to many files concurrently.
pub trait Transform: Send + Sync {
    /// Stage name used in error reports and logs.
    fn name(&self) -> &'static str;

    /// Apply the stage, producing zero, one or two output artifacts.
    fn apply(&self, artifact: Artifact) -> Result<Vec<Artifact>, TransformError>;
}

/// Fold a transform chain over one file's initial artifact.
///
/// Each stage consumes every artifact produced so far; the first stage error
/// aborts the chain for this file only.
pub fn fold_chain(
    chain: &[Box<dyn Transform>],
    initial: Artifact,
) -> Result<Vec<Artifact>, TransformError> {
    let mut artifacts = vec![initial];

    for stage in chain {
        let mut next = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            next.extend(stage.apply(artifact)?);
        }
        artifacts = next;
    }

    Ok(artifacts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(rel: &str) -> FileMeta {
        FileMeta {
            relative_path: PathBuf::from(rel),
            source_path: PathBuf::from("/src").join(rel),
            dest_path: PathBuf::from("/dist").join(rel),
        }
    }

    struct Upper;
    impl Transform for Upper {
        fn name(&self) -> &'static str {
            "upper"
        }
        fn apply(&self, artifact: Artifact) -> Result<Vec<Artifact>, TransformError> {
            let text = artifact.text()?.to_uppercase();
            Ok(vec![Artifact::new(text.into_bytes(), artifact.meta)])
        }
    }

    struct Duplicate;
    impl Transform for Duplicate {
        fn name(&self) -> &'static str {
            "duplicate"
        }
        fn apply(&self, artifact: Artifact) -> Result<Vec<Artifact>, TransformError> {
            let copy = Artifact::new(artifact.content.clone(), artifact.meta.with_suffix(".min"));
            Ok(vec![artifact, copy])
        }
    }

    struct Fail;
    impl Transform for Fail {
        fn name(&self) -> &'static str {
            "fail"
        }
        fn apply(&self, artifact: Artifact) -> Result<Vec<Artifact>, TransformError> {
            Err(TransformError::Stage("fail".to_string(), artifact.meta.relative_path.display().to_string()))
        }
    }

    #[test]
    fn test_derive_strips_base() {
        let meta = FileMeta::derive(
            Path::new("/proj/src/assets/scss/style.scss"),
            Path::new("/proj/src/assets/scss"),
            Path::new("/proj/dist/css"),
        );
        assert_eq!(meta.relative_path, PathBuf::from("style.scss"));
        assert_eq!(meta.dest_path, PathBuf::from("/proj/dist/css/style.scss"));
    }

    #[test]
    fn test_derive_outside_base_falls_back_to_file_name() {
        let meta = FileMeta::derive(
            Path::new("/elsewhere/style.scss"),
            Path::new("/proj/src"),
            Path::new("/proj/dist"),
        );
        assert_eq!(meta.relative_path, PathBuf::from("style.scss"));
    }

    #[test]
    fn test_with_suffix_before_extension() {
        let renamed = meta("js/app.js").with_suffix(".min");
        assert_eq!(renamed.relative_path, PathBuf::from("js/app.min.js"));
        assert_eq!(renamed.dest_path, PathBuf::from("/dist/js/app.min.js"));
        // Source path is untouched by renames
        assert_eq!(renamed.source_path, PathBuf::from("/src/js/app.js"));
    }

    #[test]
    fn test_with_suffix_no_extension() {
        let renamed = meta("LICENSE").with_suffix(".min");
        assert_eq!(renamed.relative_path, PathBuf::from("LICENSE.min"));
    }

    #[test]
    fn test_fold_chain_single_stage() {
        let chain: Vec<Box<dyn Transform>> = vec![Box::new(Upper)];
        let out = fold_chain(&chain, Artifact::new(b"abc".to_vec(), meta("a.txt"))).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].content, b"ABC");
    }

    #[test]
    fn test_fold_chain_fans_out() {
        // duplicate then upper: the second stage applies to both artifacts
        let chain: Vec<Box<dyn Transform>> = vec![Box::new(Duplicate), Box::new(Upper)];
        let out = fold_chain(&chain, Artifact::new(b"abc".to_vec(), meta("a.txt"))).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|a| a.content == b"ABC"));
        assert_eq!(out[1].meta.relative_path, PathBuf::from("a.min.txt"));
    }

    #[test]
    fn test_fold_chain_error_short_circuits() {
        let chain: Vec<Box<dyn Transform>> = vec![Box::new(Fail), Box::new(Upper)];
        let err = fold_chain(&chain, Artifact::new(b"abc".to_vec(), meta("a.txt"))).unwrap_err();
        assert!(matches!(err, TransformError::Stage(..)));
    }

    #[test]
    fn test_artifact_text_rejects_invalid_utf8() {
        let artifact = Artifact::new(vec![0xff, 0xfe], meta("bin.dat"));
        assert!(matches!(artifact.text(), Err(TransformError::Encoding(..))));
    }
}
