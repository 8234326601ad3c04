//! Frame ingestion.
//!
//! A `FrameSource` owns camera hardware (or a stand-in for it). When the session acquires
//! it, the source is given a `FrameSink` and pushes frames into it from its own producer
//! thread, one at a time, at whatever cadence the hardware delivers.
//!
//! Sources MUST NOT:
//! - push frames synchronously from inside `acquire`, `halt`, `set_facing` or `release`
//! - retain frames after handing them to the sink
//! - log pixel content

pub mod still;
pub mod synthetic;

use anyhow::Result;
use std::sync::Arc;

use crate::frame::{CameraFacing, Frame};

pub use still::{load_still_image, ImageInput};
pub use synthetic::{SyntheticCamera, SyntheticCameraConfig, SyntheticStats};

/// What the session did with a pushed frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameDisposition {
    /// Handed to the active recognizer.
    Dispatched,
    /// A recognition call is already outstanding; the frame was discarded.
    DroppedBusy,
    /// Processing is paused by the host.
    DroppedPaused,
    /// The session is not running (stopped, destroyed, or already gone).
    DroppedInactive,
}

/// Push handle a frame source delivers frames into.
#[derive(Clone)]
pub struct FrameSink {
    deliver: Arc<dyn Fn(Frame) -> FrameDisposition + Send + Sync>,
}

impl FrameSink {
    pub fn new<F>(deliver: F) -> Self
    where
        F: Fn(Frame) -> FrameDisposition + Send + Sync + 'static,
    {
        Self {
            deliver: Arc::new(deliver),
        }
    }

    /// Sink that discards everything.
    pub fn discard() -> Self {
        Self::new(|_| FrameDisposition::DroppedInactive)
    }

    pub fn submit(&self, frame: Frame) -> FrameDisposition {
        (self.deliver)(frame)
    }
}

impl std::fmt::Debug for FrameSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FrameSink")
    }
}

/// What an acquired camera can do.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CameraCapabilities {
    pub has_torch: bool,
    pub width: u32,
    pub height: u32,
}

/// Camera hardware seen from the session.
pub trait FrameSource: Send {
    /// Source identifier.
    fn name(&self) -> &'static str;

    /// Number of physical cameras on the device.
    fn camera_count(&self) -> usize {
        1
    }

    /// Open the camera with the given facing and start pushing frames into `sink`.
    ///
    /// Called again after `halt` to resume delivery.
    fn acquire(&mut self, facing: CameraFacing, sink: FrameSink) -> Result<CameraCapabilities>;

    /// Stop pushing frames. The camera stays acquired.
    fn halt(&mut self);

    /// Select the camera used by the next `acquire`.
    fn set_facing(&mut self, facing: CameraFacing) -> Result<()>;

    /// Switch the flash unit. Fails when the hardware has none.
    fn set_torch(&mut self, on: bool) -> Result<()>;

    /// Stop delivery and free the hardware.
    fn release(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Rotation;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn sink_forwards_to_callback() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let sink = FrameSink::new(move |frame| {
            counter.fetch_add(frame.width() as usize, Ordering::SeqCst);
            FrameDisposition::Dispatched
        });

        let frame = Frame::new(vec![0; 3], 5, 1, Rotation::Deg0, CameraFacing::Back);
        assert_eq!(sink.submit(frame), FrameDisposition::Dispatched);
        assert_eq!(seen.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn discard_sink_drops() {
        let frame = Frame::new(vec![0; 3], 1, 1, Rotation::Deg0, CameraFacing::Back);
        assert_eq!(
            FrameSink::discard().submit(frame),
            FrameDisposition::DroppedInactive
        );
    }
}
