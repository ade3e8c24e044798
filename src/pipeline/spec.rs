//! Pipeline specifications and the registry.
//!
//! A `PipelineSpec` is the resolved, immutable form of a `[[pipeline]]`
//! config entry: absolute source/watch patterns, an absolute destination
//! root, and an ordered transform chain. The registry holds specs in
//! registration order; callers pass it by shared reference into the
//! scheduler and watcher, so specs cannot change once execution starts.

use crate::config::{Config, PipelineConfig, TransformStep};
use crate::pipeline::transform::Transform;
use crate::transforms;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error registering a pipeline spec.
#[derive(Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum RegistryError {
    /// A spec with this name is already registered
    #[error("duplicate pipeline name '{0}'")]
    DuplicateName(String),
    /// Two specs write into the same destination root
    #[error("pipelines '{0}' and '{1}' share destination root {}", .2.display())]
    OverlappingDest(String, String, PathBuf),
}

/// Resolved, immutable description of one named pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSpec {
    /// Unique pipeline name
    pub name: String,
    /// Absolute glob patterns matching source files
    pub sources: Vec<String>,
    /// Absolute glob patterns whose changes retrigger this pipeline
    pub watch: Vec<String>,
    /// Absolute base path stripped from matched files
    pub base: PathBuf,
    /// Absolute destination root this pipeline writes under
    pub dest_root: PathBuf,
    /// Ordered transform chain
    pub transforms: Vec<TransformStep>,
}

impl PipelineSpec {
    /// Resolve a config entry against the project's source and destination roots.
    pub fn from_config(config: &PipelineConfig, src_root: &Path, dest_root: &Path) -> Self {
        let base = src_root.join(&config.base);
        let join_patterns = |patterns: &[String]| {
            patterns
                .iter()
                .map(|p| src_root.join(p).to_string_lossy().into_owned())
                .collect::<Vec<_>>()
        };

        Self {
            name: config.name.clone(),
            sources: join_patterns(&config.sources),
            watch: join_patterns(config.watch_patterns()),
            base,
            dest_root: dest_root.join(&config.dest),
            transforms: config.transforms.clone(),
        }
    }

    /// Instantiate this spec's transform chain.
    pub fn transform_chain(&self) -> Vec<Box<dyn Transform>> {
        self.transforms.iter().map(|step| transforms::instantiate(*step)).collect()
    }
}

/// Ordered collection of pipeline specs.
///
/// Registration order is the deterministic sequential build order.
#[derive(Debug, Default)]
pub struct Registry {
    specs: Vec<PipelineSpec>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from config, resolving paths against the project root.
    pub fn from_config(config: &Config, project_root: &Path) -> Result<Self, RegistryError> {
        let src_root = resolve_root(&config.project.src, project_root);
        let dest_root = resolve_root(&config.project.dest, project_root);

        let mut registry = Self::new();
        for pipeline in &config.pipelines {
            registry.register(PipelineSpec::from_config(pipeline, &src_root, &dest_root))?;
        }
        Ok(registry)
    }

    /// Register a spec.
    ///
    /// Rejects duplicate names, and rejects a second spec with the same
    /// destination root so that concurrent pipelines never race on writes.
    /// Nested roots (one pipeline under `dist/`, another under `dist/css/`)
    /// remain legal.
    pub fn register(&mut self, spec: PipelineSpec) -> Result<(), RegistryError> {
        for existing in &self.specs {
            if existing.name == spec.name {
                return Err(RegistryError::DuplicateName(spec.name));
            }
            if existing.dest_root == spec.dest_root {
                return Err(RegistryError::OverlappingDest(
                    existing.name.clone(),
                    spec.name,
                    spec.dest_root,
                ));
            }
        }
        self.specs.push(spec);
        Ok(())
    }

    /// All specs, in registration order.
    pub fn list_all(&self) -> &[PipelineSpec] {
        &self.specs
    }

    /// Look up a spec by name.
    pub fn get(&self, name: &str) -> Option<&PipelineSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    /// Registered pipeline names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.specs.iter().map(|s| s.name.clone()).collect()
    }
}

fn resolve_root(path: &Path, project_root: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;

    fn spec(name: &str, dest: &str) -> PipelineSpec {
        PipelineSpec {
            name: name.to_string(),
            sources: vec![format!("/src/{}/*", name)],
            watch: vec![format!("/src/{}/**/*", name)],
            base: PathBuf::from("/src"),
            dest_root: PathBuf::from(dest),
            transforms: vec![TransformStep::Copy],
        }
    }

    #[test]
    fn test_register_preserves_order() {
        let mut registry = Registry::new();
        registry.register(spec("b", "/dist/b")).unwrap();
        registry.register(spec("a", "/dist/a")).unwrap();

        let names = registry.names();
        assert_eq!(names, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_register_rejects_duplicate_name() {
        let mut registry = Registry::new();
        registry.register(spec("css", "/dist/css")).unwrap();
        let err = registry.register(spec("css", "/dist/styles")).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateName("css".to_string()));
    }

    #[test]
    fn test_register_rejects_shared_dest_root() {
        let mut registry = Registry::new();
        registry.register(spec("css", "/dist/css")).unwrap();
        let err = registry.register(spec("styles", "/dist/css")).unwrap_err();
        assert!(matches!(err, RegistryError::OverlappingDest(..)));
    }

    #[test]
    fn test_register_allows_nested_dest_roots() {
        let mut registry = Registry::new();
        registry.register(spec("html", "/dist")).unwrap();
        registry.register(spec("css", "/dist/css")).unwrap();
        assert_eq!(registry.list_all().len(), 2);
    }

    #[test]
    fn test_from_config_resolves_paths() {
        let config = default_config();
        let registry = Registry::from_config(&config, Path::new("/proj")).unwrap();

        let css = registry.get("css").unwrap();
        assert_eq!(css.dest_root, PathBuf::from("/proj/dist/css"));
        assert_eq!(css.base, PathBuf::from("/proj/src/assets/scss"));
        assert!(css.sources[0].starts_with("/proj/src"));

        let html = registry.get("html").unwrap();
        assert_eq!(html.dest_root, PathBuf::from("/proj/dist"));
    }

    #[test]
    fn test_get_unknown_name() {
        let registry = Registry::new();
        assert!(registry.get("nope").is_none());
    }
}
