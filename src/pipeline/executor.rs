//! Pipeline execution.
//!
//! Resolves a spec's source patterns against the filesystem, folds the
//! transform chain over each matched file, and writes the resulting
//! artifacts under the spec's destination root.
//!
//! Failure isolation is per file: one file's transform error is recorded
//! and the remaining files still build. The executor never deletes
//! pre-existing destination files; that is the clean step's job.

use crate::pipeline::spec::PipelineSpec;
use crate::pipeline::transform::{fold_chain, Artifact, FileMeta, Transform, TransformError};
use glob::glob;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Error that fails a whole pipeline run before any file is processed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PipelineError {
    /// Invalid glob pattern
    #[error("invalid glob pattern '{0}': {1}")]
    Pattern(String, glob::PatternError),
    /// IO error preparing the run (e.g. destination root not creatable)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of one pipeline run.
#[derive(Debug)]
pub struct ExecutionResult {
    /// Name of the pipeline that ran
    pub pipeline: String,
    /// Metadata of source files whose whole chain succeeded
    pub succeeded: Vec<FileMeta>,
    /// Source files whose chain failed, with the failing stage's error
    pub failed: Vec<(FileMeta, TransformError)>,
    /// Destination paths written this run
    pub outputs: Vec<PathBuf>,
    /// Wall-clock duration of the run
    pub duration: Duration,
}

impl ExecutionResult {
    /// True when no file failed. An empty run is a success.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Number of matched source files.
    pub fn file_count(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// True when every written artifact is a stylesheet.
    ///
    /// Drives the reload/refresh distinction: stylesheet-only runs let
    /// browsers swap CSS in place instead of reloading the page.
    pub fn css_only(&self) -> bool {
        !self.outputs.is_empty()
            && self
                .outputs
                .iter()
                .all(|p| p.extension().and_then(|e| e.to_str()) == Some("css"))
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        if self.failed.is_empty() {
            format!(
                "{}: {} file(s), {} output(s) in {:.0?}",
                self.pipeline,
                self.succeeded.len(),
                self.outputs.len(),
                self.duration
            )
        } else {
            format!(
                "{}: {} file(s) ok, {} failed in {:.0?}",
                self.pipeline,
                self.succeeded.len(),
                self.failed.len(),
                self.duration
            )
        }
    }
}

/// Resolve a spec's source patterns to a sorted, deduplicated file list.
///
/// Zero matches is not an error; empty pipelines succeed trivially.
pub fn discover_sources(spec: &PipelineSpec) -> Result<Vec<PathBuf>, PipelineError> {
    let mut files = BTreeSet::new();

    for pattern in &spec.sources {
        let paths =
            glob(pattern).map_err(|e| PipelineError::Pattern(pattern.clone(), e))?;
        for entry in paths {
            match entry {
                Ok(path) if path.is_file() => {
                    files.insert(path);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(pattern = %pattern, error = %e, "skipping unreadable path");
                }
            }
        }
    }

    Ok(files.into_iter().collect())
}

/// Run a pipeline once.
///
/// Matched files are processed concurrently; each file folds the transform
/// chain independently and writes its own artifacts.
pub fn run(spec: &PipelineSpec) -> Result<ExecutionResult, PipelineError> {
    let start = Instant::now();
    let files = discover_sources(spec)?;
    let chain = spec.transform_chain();

    fs::create_dir_all(&spec.dest_root)?;

    let per_file: Vec<Result<(FileMeta, Vec<PathBuf>), (FileMeta, TransformError)>> = files
        .par_iter()
        .map(|path| process_file(spec, &chain, path))
        .collect();

    let mut result = ExecutionResult {
        pipeline: spec.name.clone(),
        succeeded: Vec::new(),
        failed: Vec::new(),
        outputs: Vec::new(),
        duration: Duration::ZERO,
    };

    for outcome in per_file {
        match outcome {
            Ok((meta, outputs)) => {
                result.succeeded.push(meta);
                result.outputs.extend(outputs);
            }
            Err((meta, error)) => {
                tracing::warn!(
                    pipeline = %spec.name,
                    file = %meta.source_path.display(),
                    error = %error,
                    "file failed"
                );
                result.failed.push((meta, error));
            }
        }
    }

    result.duration = start.elapsed();
    Ok(result)
}

/// Read, transform and write one source file.
fn process_file(
    spec: &PipelineSpec,
    chain: &[Box<dyn Transform>],
    path: &PathBuf,
) -> Result<(FileMeta, Vec<PathBuf>), (FileMeta, TransformError)> {
    let meta = FileMeta::derive(path, &spec.base, &spec.dest_root);

    let content = fs::read(path)
        .map_err(|e| (meta.clone(), TransformError::Read(path.clone(), e.to_string())))?;

    let artifacts = fold_chain(chain, Artifact::new(content, meta.clone()))
        .map_err(|e| (meta.clone(), e))?;

    let mut outputs = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        write_artifact(&artifact).map_err(|e| (meta.clone(), e))?;
        outputs.push(artifact.meta.dest_path);
    }

    Ok((meta, outputs))
}

fn write_artifact(artifact: &Artifact) -> Result<(), TransformError> {
    let dest = &artifact.meta.dest_path;
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| TransformError::Write(dest.clone(), e.to_string()))?;
    }
    fs::write(dest, &artifact.content)
        .map_err(|e| TransformError::Write(dest.clone(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransformStep;
    use std::path::Path;
    use tempfile::TempDir;

    fn make_spec(temp: &TempDir, transforms: Vec<TransformStep>) -> PipelineSpec {
        let src = temp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        PipelineSpec {
            name: "test".to_string(),
            sources: vec![src.join("*.txt").to_string_lossy().into_owned()],
            watch: vec![],
            base: src,
            dest_root: temp.path().join("dist"),
            transforms,
        }
    }

    #[test]
    fn test_run_empty_match_succeeds() {
        let temp = TempDir::new().unwrap();
        let spec = make_spec(&temp, vec![TransformStep::Copy]);

        let result = run(&spec).unwrap();
        assert!(result.is_success());
        assert!(result.succeeded.is_empty());
        assert!(result.failed.is_empty());
        assert!(result.outputs.is_empty());
    }

    #[test]
    fn test_run_copies_files() {
        let temp = TempDir::new().unwrap();
        let spec = make_spec(&temp, vec![TransformStep::Copy]);
        fs::write(temp.path().join("src/a.txt"), b"alpha").unwrap();
        fs::write(temp.path().join("src/b.txt"), b"beta").unwrap();

        let result = run(&spec).unwrap();
        assert!(result.is_success());
        assert_eq!(result.succeeded.len(), 2);
        assert_eq!(fs::read(temp.path().join("dist/a.txt")).unwrap(), b"alpha");
        assert_eq!(fs::read(temp.path().join("dist/b.txt")).unwrap(), b"beta");
    }

    #[test]
    fn test_run_preserves_unmatched_dest_files() {
        let temp = TempDir::new().unwrap();
        let spec = make_spec(&temp, vec![TransformStep::Copy]);
        fs::create_dir_all(temp.path().join("dist")).unwrap();
        fs::write(temp.path().join("dist/stale.css"), b"old").unwrap();
        fs::write(temp.path().join("src/a.txt"), b"alpha").unwrap();

        run(&spec).unwrap();
        // The executor writes, it never deletes
        assert!(temp.path().join("dist/stale.css").exists());
    }

    #[test]
    fn test_per_file_failure_isolation() {
        let temp = TempDir::new().unwrap();
        // The include transform fails on a missing include target
        let spec = make_spec(&temp, vec![TransformStep::Include]);
        fs::write(temp.path().join("src/good.txt"), b"plain text\n").unwrap();
        fs::write(temp.path().join("src/bad.txt"), b"//= missing.txt\n").unwrap();

        let result = run(&spec).unwrap();
        assert_eq!(result.succeeded.len(), 1);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.succeeded[0].relative_path, Path::new("good.txt"));
        assert_eq!(result.failed[0].0.relative_path, Path::new("bad.txt"));
        assert!(temp.path().join("dist/good.txt").exists());
        assert!(!temp.path().join("dist/bad.txt").exists());
    }

    #[test]
    fn test_discover_sources_sorted_dedup() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("b.txt"), b"").unwrap();
        fs::write(src.join("a.txt"), b"").unwrap();

        let mut spec = make_spec(&temp, vec![TransformStep::Copy]);
        // Overlapping patterns must not produce duplicates
        spec.sources.push(src.join("a.*").to_string_lossy().into_owned());

        let files = discover_sources(&spec).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("a.txt"));
        assert!(files[1].ends_with("b.txt"));
    }

    #[test]
    fn test_invalid_pattern_is_pipeline_error() {
        let temp = TempDir::new().unwrap();
        let mut spec = make_spec(&temp, vec![TransformStep::Copy]);
        spec.sources = vec!["[".to_string()];

        assert!(matches!(run(&spec), Err(PipelineError::Pattern(..))));
    }

    #[test]
    fn test_css_only_classification() {
        let result = ExecutionResult {
            pipeline: "css".to_string(),
            succeeded: vec![],
            failed: vec![],
            outputs: vec![PathBuf::from("/d/a.css"), PathBuf::from("/d/a.min.css")],
            duration: Duration::ZERO,
        };
        assert!(result.css_only());

        let mixed = ExecutionResult {
            outputs: vec![PathBuf::from("/d/a.css"), PathBuf::from("/d/a.js")],
            ..result
        };
        assert!(!mixed.css_only());
    }
}
