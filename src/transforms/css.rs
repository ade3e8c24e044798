//! Stylesheet compilation
//!
//! Parses the sheet with lightningcss, lowers nested rules and modern
//! syntax for a browser-target set, and adds vendor prefixes. The primary
//! artifact is pretty-printed; minified printing is shared with the
//! minify stage. Comments do not survive parsing, so minified output is
//! comment-free.

use crate::pipeline::transform::{Artifact, Transform, TransformError};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};

/// Browserslist queries defining the prefixing/lowering target set.
const BROWSER_QUERIES: [&str; 2] = ["last 2 versions", "not dead"];

/// Resolve the default browser target set.
///
/// `None` disables target-based lowering rather than failing the build.
pub(crate) fn default_browsers() -> Option<Browsers> {
    Browsers::from_browserslist(BROWSER_QUERIES).ok().flatten()
}

/// Parse, lower and print a stylesheet.
pub(crate) fn compile(
    source: &str,
    browsers: Option<Browsers>,
    minify: bool,
) -> Result<String, String> {
    let targets: Targets = match browsers {
        Some(b) => b.into(),
        None => Targets::default(),
    };

    let mut sheet =
        StyleSheet::parse(source, ParserOptions::default()).map_err(|e| e.to_string())?;
    sheet
        .minify(MinifyOptions { targets, ..MinifyOptions::default() })
        .map_err(|e| e.to_string())?;
    let output = sheet
        .to_css(PrinterOptions { minify, targets, ..PrinterOptions::default() })
        .map_err(|e| e.to_string())?;

    Ok(output.code)
}

/// External-codec stage compiling `.scss`/`.css` sources to expanded CSS.
pub struct CssCompile {
    browsers: Option<Browsers>,
}

impl CssCompile {
    /// Create the stage with the default browser target set.
    pub fn new() -> Self {
        Self { browsers: default_browsers() }
    }
}

impl Default for CssCompile {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform for CssCompile {
    fn name(&self) -> &'static str {
        "css"
    }

    fn apply(&self, artifact: Artifact) -> Result<Vec<Artifact>, TransformError> {
        let source = artifact.text()?;
        let compiled = compile(source, self.browsers, false)
            .map_err(|e| TransformError::Stage("css".to_string(), e))?;

        let mut meta = artifact.meta;
        meta.relative_path = meta.relative_path.with_extension("css");
        meta.dest_path = meta.dest_path.with_extension("css");

        Ok(vec![Artifact::new(compiled.into_bytes(), meta)])
    }
}
