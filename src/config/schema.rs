//! Configuration schema types for `pipewright.toml`
//!
//! Defines the structure and defaults for pipewright project configuration.
//! With no config file present, the defaults describe the classic front-end
//! layout: markup at the source root, stylesheets, scripts, images and fonts
//! under `assets/`, all built into `dist/`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A transform stage kind, as named in a pipeline's `transforms` list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransformStep {
    /// Expand `//=`, `/*= */` and `<!--= -->` include directives
    Include,
    /// Compile the stylesheet: lower nesting, add vendor prefixes, pretty-print
    Css,
    /// Emit the artifact unchanged plus a minified `.min`-suffixed variant
    Minify,
    /// Re-encode raster images; pass other formats through
    OptimizeImage,
    /// Byte-for-byte passthrough
    Copy,
}

impl std::fmt::Display for TransformStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransformStep::Include => write!(f, "include"),
            TransformStep::Css => write!(f, "css"),
            TransformStep::Minify => write!(f, "minify"),
            TransformStep::OptimizeImage => write!(f, "optimize-image"),
            TransformStep::Copy => write!(f, "copy"),
        }
    }
}

/// Project metadata section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name
    #[serde(default = "default_name")]
    pub name: String,
    /// Source root directory
    #[serde(default = "default_src")]
    pub src: PathBuf,
    /// Destination root directory
    #[serde(default = "default_dest")]
    pub dest: PathBuf,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self { name: default_name(), src: default_src(), dest: default_dest() }
    }
}

fn default_name() -> String {
    "site".to_string()
}

fn default_src() -> PathBuf {
    PathBuf::from("src")
}

fn default_dest() -> PathBuf {
    PathBuf::from("dist")
}

/// A single pipeline declaration: source matcher, destination, transform chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name (must be unique)
    pub name: String,
    /// Glob patterns for source files, relative to the source root
    pub sources: Vec<String>,
    /// Glob patterns whose changes retrigger this pipeline.
    /// Defaults to `sources` when empty.
    #[serde(default)]
    pub watch: Vec<String>,
    /// Subpath of the source root stripped from matched files when
    /// computing their destination-relative path
    #[serde(default)]
    pub base: PathBuf,
    /// Subpath of the destination root this pipeline writes under
    #[serde(default)]
    pub dest: PathBuf,
    /// Ordered transform chain applied to every matched file
    #[serde(default)]
    pub transforms: Vec<TransformStep>,
}

/// Watch mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce window in milliseconds for coalescing change events
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Clear the terminal before each rebuild
    #[serde(default = "default_clear_screen")]
    pub clear_screen: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: default_debounce_ms(), clear_screen: default_clear_screen() }
    }
}

fn default_debounce_ms() -> u64 {
    100
}

fn default_clear_screen() -> bool {
    false
}

/// Dev server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServeConfig {
    /// Address to bind
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port() }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

/// Root configuration structure for `pipewright.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Project section
    #[serde(default)]
    pub project: ProjectConfig,
    /// Pipeline declarations, in registration order
    #[serde(default = "default_pipelines", rename = "pipeline")]
    pub pipelines: Vec<PipelineConfig>,
    /// Watch mode settings
    #[serde(default)]
    pub watch: WatchConfig,
    /// Dev server settings
    #[serde(default)]
    pub serve: ServeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: ProjectConfig::default(),
            pipelines: default_pipelines(),
            watch: WatchConfig::default(),
            serve: ServeConfig::default(),
        }
    }
}

/// The classic asset layout: markup, stylesheets, scripts, images, fonts.
pub fn default_pipelines() -> Vec<PipelineConfig> {
    vec![
        PipelineConfig {
            name: "html".to_string(),
            sources: vec!["*.html".to_string()],
            watch: vec!["**/*.html".to_string()],
            base: PathBuf::new(),
            dest: PathBuf::new(),
            transforms: vec![TransformStep::Include],
        },
        PipelineConfig {
            name: "css".to_string(),
            sources: vec!["assets/scss/*.scss".to_string()],
            watch: vec!["assets/scss/**/*.scss".to_string()],
            base: PathBuf::from("assets/scss"),
            dest: PathBuf::from("css"),
            transforms: vec![TransformStep::Css, TransformStep::Minify],
        },
        PipelineConfig {
            name: "js".to_string(),
            sources: vec!["assets/js/*.js".to_string()],
            watch: vec!["assets/js/**/*.js".to_string()],
            base: PathBuf::from("assets/js"),
            dest: PathBuf::from("js"),
            transforms: vec![TransformStep::Include, TransformStep::Minify],
        },
        PipelineConfig {
            name: "img".to_string(),
            sources: vec![
                "assets/img/**/*.png".to_string(),
                "assets/img/**/*.jpg".to_string(),
                "assets/img/**/*.jpeg".to_string(),
                "assets/img/**/*.ico".to_string(),
                "assets/img/**/*.svg".to_string(),
                "assets/img/**/*.webp".to_string(),
            ],
            watch: vec!["assets/img/**/*".to_string()],
            base: PathBuf::from("assets/img"),
            dest: PathBuf::from("img"),
            transforms: vec![TransformStep::OptimizeImage],
        },
        PipelineConfig {
            name: "fonts".to_string(),
            sources: vec![
                "assets/fonts/**/*.woff".to_string(),
                "assets/fonts/**/*.woff2".to_string(),
            ],
            watch: vec!["assets/fonts/**/*".to_string()],
            base: PathBuf::from("assets/fonts"),
            dest: PathBuf::from("fonts"),
            transforms: vec![TransformStep::Copy],
        },
    ]
}

impl PipelineConfig {
    /// Watch patterns for this pipeline, falling back to the source patterns.
    pub fn watch_patterns(&self) -> &[String] {
        if self.watch.is_empty() {
            &self.sources
        } else {
            &self.watch
        }
    }
}
