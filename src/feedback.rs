//! User-facing success cues.

use std::io::Write;

/// Audible/haptic cue fired once per successful non-empty result.
///
/// Sinks are fire-and-forget and may be shared process-wide; the session does not lock
/// around `trigger`.
pub trait FeedbackSink: Send + Sync {
    fn trigger(&self, play_sound: bool, vibrate: bool);
}

/// Terminal feedback: rings the bell on stderr and logs a vibration cue.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleFeedback {
    quiet: bool,
}

impl ConsoleFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log only; never write the bell character.
    pub fn quiet() -> Self {
        Self { quiet: true }
    }
}

impl FeedbackSink for ConsoleFeedback {
    fn trigger(&self, play_sound: bool, vibrate: bool) {
        if play_sound {
            if self.quiet {
                log::info!("feedback: beep");
            } else {
                let mut stderr = std::io::stderr();
                let _ = stderr.write_all(b"\x07");
                let _ = stderr.flush();
            }
        }
        if vibrate {
            log::info!("feedback: vibrate");
        }
    }
}

/// Sink that does nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoFeedback;

impl FeedbackSink for NoFeedback {
    fn trigger(&self, _play_sound: bool, _vibrate: bool) {}
}
