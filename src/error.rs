use thiserror::Error;

use crate::recognize::RecognitionMode;
use crate::session::SessionState;

/// Errors surfaced synchronously by `ScanSession` operations.
///
/// Per-frame recognition failures are not part of this type: they are reported to the
/// listener through `SessionListener::on_fail` and the session keeps scanning.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The frame source could not be acquired. Never retried internally.
    #[error("camera unavailable: {source}")]
    CameraUnavailable {
        #[source]
        source: anyhow::Error,
    },

    /// A still image was missing or could not be decoded.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The session has been destroyed.
    #[error("scan session destroyed")]
    SessionDestroyed,

    /// The operation is not valid in the current lifecycle state.
    #[error("{op} not allowed in state {state:?}")]
    IllegalState {
        op: &'static str,
        state: SessionState,
    },

    /// No recognizer is registered for the requested mode.
    #[error("no recognizer registered for {0:?} mode")]
    RecognizerMissing(RecognitionMode),

    /// A recognition worker could not be started.
    #[error("failed to dispatch recognition: {0}")]
    Dispatch(#[from] std::io::Error),
}

/// Code passed to `SessionListener::on_fail`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureCode {
    /// The recognizer call failed.
    RecognitionFailure,
    /// A still-image scan was requested with no path or URI.
    EmptyInput,
}

impl FailureCode {
    pub fn code(self) -> i32 {
        match self {
            FailureCode::RecognitionFailure => 1,
            FailureCode::EmptyInput => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_codes_match_listener_contract() {
        assert_eq!(FailureCode::RecognitionFailure.code(), 1);
        assert_eq!(FailureCode::EmptyInput.code(), 2);
    }

    #[test]
    fn camera_unavailable_keeps_source_message() {
        let err = ScanError::CameraUnavailable {
            source: anyhow::anyhow!("device busy"),
        };
        assert_eq!(err.to_string(), "camera unavailable: device busy");
    }
}
