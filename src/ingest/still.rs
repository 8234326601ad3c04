//! Still-image input for single-shot scans.
//!
//! Local paths and `file://` URIs are decoded in-memory (JPEG/PNG), downscaled so the
//! longer side fits the configured bound, and converted to RGB. Remote URIs are refused.

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use std::path::Path;

use crate::error::ScanError;
use crate::frame::Frame;

/// Where a still image comes from.
#[derive(Debug)]
pub enum ImageInput {
    /// Local filesystem path. An empty string means "no image selected".
    Path(String),
    /// `file://` URI. An empty string means "no image selected".
    Uri(String),
    /// Already-decoded frame.
    Frame(Frame),
}

impl ImageInput {
    /// True for the legacy "no image" input (blank path or URI).
    pub fn is_blank(&self) -> bool {
        match self {
            ImageInput::Path(path) => path.trim().is_empty(),
            ImageInput::Uri(uri) => uri.trim().is_empty(),
            ImageInput::Frame(_) => false,
        }
    }
}

/// Decode `input` into a still-image frame.
///
/// Blank inputs must be filtered by the caller with `ImageInput::is_blank`; passing one
/// here is an `InvalidInput` error.
pub fn load_still_image(input: ImageInput, max_dimension: u32) -> Result<Frame, ScanError> {
    if input.is_blank() {
        return Err(ScanError::InvalidInput("no image supplied".to_string()));
    }
    let frame = match input {
        ImageInput::Frame(frame) => frame,
        ImageInput::Path(path) => decode_file(Path::new(&path), max_dimension)
            .map_err(|e| ScanError::InvalidInput(format!("{:#}", e)))?,
        ImageInput::Uri(uri) => {
            let path = local_path_from_uri(&uri)
                .map_err(|e| ScanError::InvalidInput(format!("{:#}", e)))?;
            decode_file(Path::new(path), max_dimension)
                .map_err(|e| ScanError::InvalidInput(format!("{:#}", e)))?
        }
    };
    if frame.is_empty() {
        return Err(ScanError::InvalidInput("image has no pixels".to_string()));
    }
    Ok(frame.into_still())
}

fn local_path_from_uri(uri: &str) -> Result<&str> {
    let uri = uri.trim();
    if let Some(path) = uri.strip_prefix("file://") {
        if path.is_empty() {
            return Err(anyhow!("file URI has no path"));
        }
        return Ok(path);
    }
    if uri.contains("://") {
        return Err(anyhow!("only file:// URIs can be scanned (got {})", uri));
    }
    Ok(uri)
}

fn decode_file(path: &Path, max_dimension: u32) -> Result<Frame> {
    let decoded =
        image::open(path).with_context(|| format!("failed to decode {}", path.display()))?;
    let bound = max_dimension.max(1);
    let scaled = if decoded.width() > bound || decoded.height() > bound {
        decoded.resize(bound, bound, FilterType::Triangle)
    } else {
        decoded
    };
    let rgb = scaled.to_rgb8();
    let (width, height) = rgb.dimensions();
    log::debug!(
        "still image {} decoded to {}x{}",
        path.display(),
        width,
        height
    );
    Ok(Frame::still(rgb.into_raw(), width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{CameraFacing, Rotation};

    #[test]
    fn blank_inputs_are_detected() {
        assert!(ImageInput::Path("  ".into()).is_blank());
        assert!(ImageInput::Uri(String::new()).is_blank());
        assert!(!ImageInput::Path("/tmp/a.png".into()).is_blank());
    }

    #[test]
    fn remote_uris_are_refused() {
        let err = load_still_image(ImageInput::Uri("https://example.com/a.png".into()), 600)
            .unwrap_err();
        assert!(matches!(err, ScanError::InvalidInput(_)));
    }

    #[test]
    fn missing_file_is_invalid_input() {
        let err =
            load_still_image(ImageInput::Path("/nonexistent/scan.png".into()), 600).unwrap_err();
        assert!(matches!(err, ScanError::InvalidInput(_)));
    }

    #[test]
    fn decodes_and_downscales_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.png");
        image::RgbImage::from_pixel(1200, 300, image::Rgb([10, 20, 30]))
            .save(&path)
            .unwrap();

        let uri = format!("file://{}", path.display());
        let frame = load_still_image(ImageInput::Uri(uri), 600).unwrap();

        assert_eq!((frame.width(), frame.height()), (600, 150));
        assert_eq!(frame.pixels().len(), 600 * 150 * 3);
        assert!(frame.is_still_image());
    }

    #[test]
    fn supplied_frames_are_marked_still() {
        let frame = Frame::new(vec![1; 12], 2, 2, Rotation::Deg0, CameraFacing::Front);
        let still = load_still_image(ImageInput::Frame(frame), 600).unwrap();
        assert!(still.is_still_image());
        assert_eq!(still.facing(), CameraFacing::Front);
    }

    #[test]
    fn empty_frames_are_invalid() {
        let frame = Frame::new(vec![], 0, 0, Rotation::Deg0, CameraFacing::Back);
        assert!(load_still_image(ImageInput::Frame(frame), 600).is_err());
    }
}
