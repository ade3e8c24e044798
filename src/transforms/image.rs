//! Raster image optimization
//!
//! Re-encodes PNG and JPEG sources through the `image` crate (JPEG at
//! quality 80), keeping the smaller of the original and the re-encoded
//! bytes. Formats the codec does not handle (svg, ico, webp) pass through
//! unchanged.

use crate::pipeline::transform::{Artifact, Transform, TransformError};
use image::ImageOutputFormat;
use std::io::Cursor;

/// JPEG re-encode quality.
const JPEG_QUALITY: u8 = 80;

/// External-codec stage recompressing raster images.
pub struct OptimizeImage;

impl Transform for OptimizeImage {
    fn name(&self) -> &'static str {
        "optimize-image"
    }

    fn apply(&self, artifact: Artifact) -> Result<Vec<Artifact>, TransformError> {
        let ext = artifact
            .meta
            .relative_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        let format = match ext.as_str() {
            "png" => ImageOutputFormat::Png,
            "jpg" | "jpeg" => ImageOutputFormat::Jpeg(JPEG_QUALITY),
            _ => return Ok(vec![artifact]),
        };

        let decoded = image::load_from_memory(&artifact.content).map_err(|e| {
            TransformError::Stage("optimize-image".to_string(), e.to_string())
        })?;

        let mut encoded = Vec::new();
        decoded
            .write_to(&mut Cursor::new(&mut encoded), format)
            .map_err(|e| TransformError::Stage("optimize-image".to_string(), e.to_string()))?;

        tracing::debug!(
            file = %artifact.meta.relative_path.display(),
            before = artifact.content.len(),
            after = encoded.len(),
            "image re-encoded"
        );

        // An optimizer must never grow a file
        let content = if encoded.len() < artifact.content.len() {
            encoded
        } else {
            artifact.content
        };

        Ok(vec![Artifact::new(content, artifact.meta)])
    }
}
