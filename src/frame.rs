//! Captured frames and the metadata that travels with recognition results.
//!
//! - `Frame`: owned pixel buffer plus orientation and camera-facing tags. Immutable once
//!   captured; pixels are private and scrubbed when the frame is released.
//! - `OverlayMetadata`: the coordinate information a host needs to draw results over the
//!   preview. It is copied out of the frame before the frame is dropped.

use serde::{Deserialize, Serialize};
use std::time::Instant;
use zeroize::Zeroize;

// ----------------------------------------------------------------------------
// Camera facing / rotation tags
// ----------------------------------------------------------------------------

/// Which physical camera produced a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraFacing {
    Front,
    #[default]
    Back,
}

impl CameraFacing {
    /// The other camera.
    pub fn flipped(self) -> Self {
        match self {
            CameraFacing::Front => CameraFacing::Back,
            CameraFacing::Back => CameraFacing::Front,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "front" => Some(CameraFacing::Front),
            "back" | "rear" => Some(CameraFacing::Back),
            _ => None,
        }
    }
}

/// Clockwise rotation to apply to the buffer to get an upright image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn degrees(self) -> u32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    pub fn from_degrees(degrees: u32) -> Option<Self> {
        match degrees % 360 {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }
}

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// One captured image.
///
/// There is no `Clone` and no mutable access to the pixels: a frame is handed to the
/// session by value, lent to exactly one recognizer call, then dropped.
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    rotation: Rotation,
    facing: CameraFacing,
    still_image: bool,
    captured_at: Instant,
}

impl Frame {
    /// Wrap a camera buffer.
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        rotation: Rotation,
        facing: CameraFacing,
    ) -> Self {
        Self {
            data,
            width,
            height,
            rotation,
            facing,
            still_image: false,
            captured_at: Instant::now(),
        }
    }

    /// Frame built from a decoded still image rather than the camera stream.
    pub(crate) fn still(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self::new(data, width, height, Rotation::Deg0, CameraFacing::Back).into_still()
    }

    pub(crate) fn into_still(mut self) -> Self {
        self.still_image = true;
        self
    }

    /// Read-only pixel access for recognizers.
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn facing(&self) -> CameraFacing {
        self.facing
    }

    pub fn is_still_image(&self) -> bool {
        self.still_image
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() || self.width == 0 || self.height == 0
    }

    /// Milliseconds since capture.
    pub fn age_ms(&self) -> u128 {
        self.captured_at.elapsed().as_millis()
    }

    /// Overlay coordinates for results derived from this frame.
    pub fn metadata(&self) -> OverlayMetadata {
        OverlayMetadata {
            width: self.width,
            height: self.height,
            rotation: self.rotation,
            facing: self.facing,
            still_image: self.still_image,
        }
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Pixel content is never logged.
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("rotation", &self.rotation)
            .field("facing", &self.facing)
            .field("still_image", &self.still_image)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl Frame {
    /// Overwrite and clear the pixel buffer.
    fn wipe(&mut self) {
        self.data.zeroize();
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        self.wipe();
    }
}

/// Geometry of the frame a result was computed from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct OverlayMetadata {
    pub width: u32,
    pub height: u32,
    pub rotation: Rotation,
    pub facing: CameraFacing,
    /// True when the result came from a still image instead of the live preview.
    pub still_image: bool,
}

impl OverlayMetadata {
    /// Width and height as displayed, after applying the rotation.
    pub fn upright_size(&self) -> (u32, u32) {
        match self.rotation {
            Rotation::Deg90 | Rotation::Deg270 => (self.height, self.width),
            Rotation::Deg0 | Rotation::Deg180 => (self.width, self.height),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_carries_frame_tags() {
        let frame = Frame::new(vec![1, 2, 3], 640, 480, Rotation::Deg90, CameraFacing::Front);
        let meta = frame.metadata();

        assert_eq!(meta.width, 640);
        assert_eq!(meta.height, 480);
        assert_eq!(meta.facing, CameraFacing::Front);
        assert!(!meta.still_image);
        assert_eq!(meta.upright_size(), (480, 640));
    }

    #[test]
    fn still_frames_are_tagged() {
        let frame = Frame::still(vec![0; 12], 2, 2);
        assert!(frame.is_still_image());
        assert!(frame.metadata().still_image);
    }

    #[test]
    fn empty_frames_are_detected() {
        assert!(Frame::new(vec![], 10, 10, Rotation::Deg0, CameraFacing::Back).is_empty());
        assert!(Frame::new(vec![1], 0, 10, Rotation::Deg0, CameraFacing::Back).is_empty());
        assert!(!Frame::new(vec![1], 1, 1, Rotation::Deg0, CameraFacing::Back).is_empty());
    }

    #[test]
    fn wiped_frames_hold_no_pixels() {
        let mut frame = Frame::new(vec![7; 12], 2, 2, Rotation::Deg0, CameraFacing::Back);
        frame.wipe();
        assert!(frame.is_empty());
        assert!(frame.data.is_empty());
    }

    #[test]
    fn facing_parse_and_flip() {
        assert_eq!(CameraFacing::parse("FRONT"), Some(CameraFacing::Front));
        assert_eq!(CameraFacing::parse("rear"), Some(CameraFacing::Back));
        assert_eq!(CameraFacing::parse("side"), None);
        assert_eq!(CameraFacing::Back.flipped(), CameraFacing::Front);
    }

    #[test]
    fn rotation_round_trips_degrees() {
        assert_eq!(Rotation::from_degrees(450), Some(Rotation::Deg90));
        assert_eq!(Rotation::from_degrees(45), None);
        assert_eq!(Rotation::Deg270.degrees(), 270);
    }
}
