use crate::error::FailureCode;
use crate::frame::OverlayMetadata;
use crate::recognize::RecognitionResult;

/// Consumer-supplied receiver of recognition outcomes.
///
/// Callbacks run on a recognition worker thread with no session lock held, so a listener
/// may call back into the session (for example `set_analyze_enabled(false)` after the
/// first hit). At most one callback runs at a time per session.
pub trait SessionListener: Send + Sync {
    /// A recognition completed while analysis was enabled. `result` may be empty.
    fn on_success(&self, result: RecognitionResult, overlay: OverlayMetadata);

    /// A recognition failed, or a still-image scan was requested without an image.
    fn on_fail(&self, code: FailureCode, error: &anyhow::Error);
}
