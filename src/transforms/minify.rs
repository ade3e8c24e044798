//! Minified-variant emission
//!
//! Dual-artifact stage: passes the incoming artifact through unchanged and
//! additionally emits a minified copy with `.min` inserted before the final
//! extension (`app.js` -> `app.min.js`). Stylesheets are minified through
//! lightningcss; scripts get comments stripped and whitespace collapsed;
//! anything else is renamed without content changes.

use crate::pipeline::transform::{Artifact, Transform, TransformError};
use crate::transforms::css;
use lightningcss::targets::Browsers;

/// Suffix inserted before the final extension of minified variants.
const MIN_SUFFIX: &str = ".min";

/// Rename-plus-codec stage emitting a `.min` variant alongside the original.
pub struct MinifyVariant {
    browsers: Option<Browsers>,
}

impl MinifyVariant {
    /// Create the stage with the default browser target set.
    pub fn new() -> Self {
        Self { browsers: css::default_browsers() }
    }
}

impl Default for MinifyVariant {
    fn default() -> Self {
        Self::new()
    }
}

impl Transform for MinifyVariant {
    fn name(&self) -> &'static str {
        "minify"
    }

    fn apply(&self, artifact: Artifact) -> Result<Vec<Artifact>, TransformError> {
        let ext = artifact
            .meta
            .relative_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        let minified = match ext.as_str() {
            "css" => css::compile(artifact.text()?, self.browsers, true)
                .map_err(|e| TransformError::Stage("minify".to_string(), e))?
                .into_bytes(),
            "js" => minify_js(artifact.text()?).into_bytes(),
            _ => artifact.content.clone(),
        };

        let variant = Artifact::new(minified, artifact.meta.with_suffix(MIN_SUFFIX));
        Ok(vec![artifact, variant])
    }
}

/// Conservative script minification: strip comments, collapse whitespace.
///
/// Statement structure is preserved (newlines survive), so automatic
/// semicolon insertion is never disturbed.
pub fn minify_js(source: &str) -> String {
    let stripped = strip_js_comments(source);

    let mut out = String::with_capacity(stripped.len());
    for line in stripped.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        out.push_str(trimmed);
        out.push('\n');
    }
    out
}

/// Remove `//` and `/* */` comments, leaving string and template literals
/// untouched.
fn strip_js_comments(source: &str) -> String {
    enum State {
        Code,
        Str(char),
        LineComment,
        BlockComment,
    }

    let mut state = State::Code;
    let mut escaped = false;
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Code => match c {
                '"' | '\'' | '`' => {
                    state = State::Str(c);
                    out.push(c);
                }
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    state = State::LineComment;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = State::BlockComment;
                }
                _ => out.push(c),
            },
            State::Str(quote) => {
                out.push(c);
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == quote {
                    state = State::Code;
                }
            }
            State::LineComment => {
                if c == '\n' {
                    out.push('\n');
                    state = State::Code;
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Code;
                }
            }
        }
    }

    out
}
