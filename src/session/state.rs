//! State guarded by the session lock, and the decisions taken under it.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread::ThreadId;

use crate::error::ScanError;
use crate::frame::CameraFacing;
use crate::ingest::CameraCapabilities;
use crate::listener::SessionListener;
use crate::recognize::{
    RecognitionMode, RecognitionResult, RecognizerOptions, RecognizerRegistry, SharedRecognizer,
};

/// Lifecycle of a scan session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Running,
    Stopped,
    Destroyed,
}

/// Consumer-controlled switches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Gate on result delivery. Frames are still recognized while false.
    pub analyze_enabled: bool,
    /// Stored for hosts that want it; no coordination logic reads it.
    pub continuous_scan: bool,
    pub play_feedback: bool,
    pub vibrate_on_success: bool,
    pub torch_on: bool,
    pub camera_facing: CameraFacing,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            analyze_enabled: true,
            continuous_scan: true,
            play_feedback: true,
            vibrate_on_success: true,
            torch_on: false,
            camera_facing: CameraFacing::Back,
        }
    }
}

/// Session counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub frames_submitted: u64,
    pub frames_dispatched: u64,
    pub frames_dropped_busy: u64,
    pub frames_dropped_inactive: u64,
    pub frames_dropped_paused: u64,
    pub still_images: u64,
    pub results_delivered: u64,
    pub results_suppressed: u64,
    pub failures_delivered: u64,
    pub stale_completions: u64,
    pub feedback_triggers: u64,
}

/// Identity of one recognizer call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Ticket {
    pub generation: u64,
    pub seq: u64,
}

/// Listener callback in progress: the thread running it and the call it reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Delivery {
    pub thread: ThreadId,
    pub ticket: Ticket,
}

/// What to do with a current-generation completion.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum DeliveryPlan {
    /// Successful result while analysis is disabled; drop silently.
    Suppressed,
    /// Deliver `on_success`, firing feedback first when `feedback` is set.
    Success { feedback: Option<(bool, bool)> },
    /// Deliver `on_fail(RecognitionFailure)`.
    Failure,
}

pub(crate) struct Core {
    pub state: SessionState,
    pub mode: RecognitionMode,
    pub config: SessionConfig,
    pub options: Arc<RecognizerOptions>,
    pub registry: Option<RecognizerRegistry>,
    pub active: Option<SharedRecognizer>,
    pub listener: Option<Arc<dyn SessionListener>>,
    pub capabilities: Option<CameraCapabilities>,
    pub processing_paused: bool,
    pub light_on: bool,
    pub delivering: Option<Delivery>,
    pub stats: SessionStats,
    generation: u64,
    next_seq: u64,
    in_flight: Option<Ticket>,
}

impl Core {
    pub fn new(
        mode: RecognitionMode,
        config: SessionConfig,
        options: RecognizerOptions,
        registry: RecognizerRegistry,
    ) -> Self {
        Self {
            state: SessionState::Created,
            mode,
            config,
            options: Arc::new(options),
            registry: Some(registry),
            active: None,
            listener: None,
            capabilities: None,
            processing_paused: false,
            light_on: false,
            delivering: None,
            stats: SessionStats::default(),
            generation: 0,
            next_seq: 0,
            in_flight: None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn ensure_alive(&self) -> Result<(), ScanError> {
        if self.state == SessionState::Destroyed {
            return Err(ScanError::SessionDestroyed);
        }
        Ok(())
    }

    /// A recognizer call is outstanding for the current generation. The slot stays
    /// claimed until its listener callback has returned.
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Like `is_busy`, except the slot is free to the thread that is delivering the
    /// outstanding call's own result, so a listener can queue a still image from inside
    /// its callback.
    pub fn is_busy_for(&self, thread: ThreadId) -> bool {
        let own_delivery = self
            .delivering
            .is_some_and(|d| d.thread == thread && self.in_flight == Some(d.ticket));
        self.is_busy() && !own_delivery
    }

    /// Recognizer for the current mode, installing it from the registry if needed.
    pub fn active_recognizer(&mut self) -> Result<SharedRecognizer, ScanError> {
        if let Some(active) = &self.active {
            return Ok(active.clone());
        }
        let recognizer = self.lookup(self.mode)?;
        self.install(recognizer.clone());
        Ok(recognizer)
    }

    pub fn lookup(&self, mode: RecognitionMode) -> Result<SharedRecognizer, ScanError> {
        self.registry
            .as_ref()
            .ok_or(ScanError::SessionDestroyed)?
            .get(mode)
    }

    /// Make `recognizer` the active engine. Warm-up is the caller's job, after the
    /// session lock is dropped.
    pub fn install(&mut self, recognizer: SharedRecognizer) {
        self.active = Some(recognizer);
    }

    /// Invalidate every outstanding call. Their completions will be dropped as stale.
    pub fn bump_generation(&mut self) {
        self.generation += 1;
        self.in_flight = None;
    }

    /// Reserve the single outstanding-call slot. Callers check `is_busy` first.
    pub fn claim(&mut self) -> Ticket {
        self.next_seq += 1;
        let ticket = Ticket {
            generation: self.generation,
            seq: self.next_seq,
        };
        self.in_flight = Some(ticket);
        ticket
    }

    /// Give the slot back if `ticket` still holds it.
    pub fn abandon(&mut self, ticket: Ticket) {
        if self.in_flight == Some(ticket) {
            self.in_flight = None;
        }
    }

    /// True if a completion for `ticket` may still reach the listener.
    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.generation == self.generation && self.state != SessionState::Destroyed
    }

    /// Check a finished call. A current ticket keeps its slot until delivery is done;
    /// a stale one is counted and gives up whatever it still holds.
    pub fn accept(&mut self, ticket: Ticket) -> bool {
        if self.is_current(ticket) {
            return true;
        }
        self.abandon(ticket);
        self.stats.stale_completions += 1;
        false
    }

    /// Decide how a current completion is delivered and count it.
    pub fn plan_delivery(
        &mut self,
        outcome: &anyhow::Result<RecognitionResult>,
    ) -> DeliveryPlan {
        match outcome {
            Err(_) => {
                self.stats.failures_delivered += 1;
                DeliveryPlan::Failure
            }
            Ok(_) if !self.config.analyze_enabled => {
                self.stats.results_suppressed += 1;
                DeliveryPlan::Suppressed
            }
            Ok(result) => {
                self.stats.results_delivered += 1;
                let wants_feedback = self.config.play_feedback || self.config.vibrate_on_success;
                let feedback = if !result.is_empty() && wants_feedback {
                    self.stats.feedback_triggers += 1;
                    Some((self.config.play_feedback, self.config.vibrate_on_success))
                } else {
                    None
                };
                DeliveryPlan::Success { feedback }
            }
        }
    }
}
