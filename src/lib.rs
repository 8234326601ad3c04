//! Scan Session
//!
//! Live-camera scanning coordinator. Frames from a camera are fed one at a time to a
//! pluggable recognizer (barcode or text); results reach a consumer-supplied listener and
//! trigger a beep/vibration cue on success.
//!
//! # Guarantees
//!
//! 1. **Single outstanding call**: at most one recognition runs per session. Camera frames
//!    that arrive meanwhile are dropped, never queued.
//! 2. **No stale delivery**: switching mode or destroying the session invalidates every
//!    outstanding call; late completions never reach the listener or the feedback sink.
//! 3. **Feedback once per hit**: the feedback sink fires at most once per successful,
//!    non-empty result, and never for empty or failed ones.
//! 4. **Failures do not stop scanning**: a failed recognition is reported and the next
//!    frame is processed normally.
//!
//! # Module Structure
//!
//! - `session`: `ScanSession` state machine, dispatch and delivery
//! - `recognize`: `Recognizer` contract, results, registry, stub engines
//! - `ingest`: `FrameSource` contract, synthetic camera, still-image loading
//! - `frame`: `Frame` and overlay metadata
//! - `feedback`, `listener`: outward collaborator contracts
//! - `config`: host configuration (file + environment)

pub mod config;
pub mod error;
pub mod feedback;
pub mod frame;
pub mod ingest;
pub mod listener;
pub mod recognize;
pub mod session;

pub use error::{FailureCode, ScanError};
pub use feedback::{ConsoleFeedback, FeedbackSink, NoFeedback};
pub use frame::{CameraFacing, Frame, OverlayMetadata, Rotation};
pub use ingest::{
    load_still_image, CameraCapabilities, FrameDisposition, FrameSink, FrameSource, ImageInput,
    SyntheticCamera, SyntheticCameraConfig,
};
pub use listener::SessionListener;
pub use recognize::{
    Barcode, BarcodeFormat, BoundingBox, RecognitionMode, RecognitionResult, RecognizedText,
    Recognizer, RecognizerOptions, RecognizerRegistry, StubBarcodeRecognizer, StubTextRecognizer,
    TextBlock, TextLine, TextScript,
};
pub use session::{
    ScanSession, SessionConfig, SessionSettings, SessionState, SessionStats,
    DEFAULT_STILL_MAX_DIMENSION,
};
