//! Built-in transform stages.
//!
//! Each stage implements the [`Transform`](crate::pipeline::Transform)
//! trait; pipelines name them in config and the spec instantiates the
//! chain per run.

pub mod css;
pub mod image;
pub mod include;
pub mod minify;

pub use css::CssCompile;
pub use image::OptimizeImage;
pub use include::Include;
pub use minify::MinifyVariant;

use crate::config::TransformStep;
use crate::pipeline::transform::{Artifact, Transform, TransformError};

/// Byte-for-byte passthrough (fonts and other copied assets).
pub struct Copy;

impl Transform for Copy {
    fn name(&self) -> &'static str {
        "copy"
    }

    fn apply(&self, artifact: Artifact) -> Result<Vec<Artifact>, TransformError> {
        Ok(vec![artifact])
    }
}

/// Instantiate the stage for a config-declared step.
pub fn instantiate(step: TransformStep) -> Box<dyn Transform> {
    match step {
        TransformStep::Include => Box::new(Include),
        TransformStep::Css => Box::new(CssCompile::new()),
        TransformStep::Minify => Box::new(MinifyVariant::new()),
        TransformStep::OptimizeImage => Box::new(OptimizeImage),
        TransformStep::Copy => Box::new(Copy),
    }
}
