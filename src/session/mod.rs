//! Scan session coordinator.
//!
//! A `ScanSession` owns one frame source and one active recognizer. Camera frames arrive
//! through a `FrameSink` on the source's producer thread; each accepted frame is
//! recognized on a worker thread; completions come back through a single lock.
//!
//! # Concurrency
//!
//! `Core` (mode, generation, outstanding call, lifecycle state, config, listener, stats)
//! sits behind one mutex. Frame submission and completion handling only ever take that
//! lock. Frame-source lifecycle calls are serialized by a second `camera` lock, which is
//! always taken first and is never held while waiting on the core condvar.
//!
//! - At most one recognizer call is outstanding, and its slot is held until the listener
//!   callback for it has returned. Camera frames arriving meanwhile are dropped, not
//!   queued.
//! - Calls run on one long-lived worker thread, so results are delivered in dispatch
//!   order.
//! - `set_mode` and `destroy` bump the generation. Completions carrying an older
//!   generation are dropped without reaching the listener or the feedback sink.
//! - Listener and feedback callbacks run with no lock held. A generation bump issued
//!   from another thread waits for a running callback to return, so once
//!   `set_mode`/`destroy` returns nothing from the old generation can be delivered.

mod dispatch;
mod state;

use anyhow::anyhow;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use self::dispatch::{Dispatcher, Job};
use self::state::{Core, Delivery, DeliveryPlan, Ticket};
use crate::error::{FailureCode, ScanError};
use crate::feedback::FeedbackSink;
use crate::frame::{CameraFacing, Frame, OverlayMetadata};
use crate::ingest::{load_still_image, FrameDisposition, FrameSink, FrameSource, ImageInput};
use crate::listener::SessionListener;
use crate::recognize::{
    BarcodeFormat, RecognitionMode, RecognitionResult, RecognizerOptions, RecognizerRegistry,
    SharedRecognizer, TextScript,
};

pub use self::state::{SessionConfig, SessionState, SessionStats};

/// Default bound for the longer side of decoded still images.
pub const DEFAULT_STILL_MAX_DIMENSION: u32 = 600;

/// Initial settings for a new session.
#[derive(Clone, Debug)]
pub struct SessionSettings {
    pub mode: RecognitionMode,
    pub config: SessionConfig,
    pub recognizer_options: RecognizerOptions,
    pub still_max_dimension: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            mode: RecognitionMode::Barcode,
            config: SessionConfig::default(),
            recognizer_options: RecognizerOptions::default(),
            still_max_dimension: DEFAULT_STILL_MAX_DIMENSION,
        }
    }
}

pub(crate) struct Shared {
    core: Mutex<Core>,
    signal: Condvar,
    camera: Mutex<Option<Box<dyn FrameSource>>>,
    dispatcher: Dispatcher,
    feedback: Arc<dyn FeedbackSink>,
    still_max_dimension: u32,
}

/// Handle to a scan session. Clones share the same session.
///
/// Dropping handles does not release the camera; call `destroy` (or `on_teardown`).
#[derive(Clone)]
pub struct ScanSession {
    shared: Arc<Shared>,
}

impl ScanSession {
    /// Build a session in the `Created` state.
    ///
    /// Fails with `RecognizerMissing` when no recognizer is registered for the initial mode.
    pub fn new(
        source: Box<dyn FrameSource>,
        recognizers: RecognizerRegistry,
        feedback: Arc<dyn FeedbackSink>,
        settings: SessionSettings,
    ) -> Result<Self, ScanError> {
        if !recognizers.supports(settings.mode) {
            return Err(ScanError::RecognizerMissing(settings.mode));
        }
        if settings.config.continuous_scan {
            log::debug!("continuous_scan is recorded but does not change frame handling");
        }
        let core = Core::new(
            settings.mode,
            settings.config,
            settings.recognizer_options,
            recognizers,
        );
        Ok(Self {
            shared: Arc::new(Shared {
                core: Mutex::new(core),
                signal: Condvar::new(),
                camera: Mutex::new(Some(source)),
                dispatcher: Dispatcher::new(),
                feedback,
                still_max_dimension: settings.still_max_dimension.max(1),
            }),
        })
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Acquire the camera and begin recognizing frames.
    ///
    /// Idempotent while running. Acquisition failures surface as `CameraUnavailable` and
    /// leave the session in its previous state; nothing is retried.
    pub fn start(&self) -> Result<(), ScanError> {
        let mut camera = self.shared.lock_camera();
        let (facing, torch_on, fresh) = {
            let mut core = self.shared.lock_core();
            match core.state {
                SessionState::Running => return Ok(()),
                SessionState::Destroyed => {
                    return Err(ScanError::IllegalState {
                        op: "start",
                        state: SessionState::Destroyed,
                    })
                }
                SessionState::Created | SessionState::Stopped => {}
            }
            let fresh = core.active.is_none();
            let recognizer = core.active_recognizer()?;
            (
                core.config.camera_facing,
                core.config.torch_on,
                fresh.then_some(recognizer),
            )
        };
        if let Some(recognizer) = fresh {
            warm_up(&recognizer);
        }

        let source = camera.as_mut().ok_or(ScanError::SessionDestroyed)?;
        let capabilities = source
            .acquire(facing, self.shared.sink())
            .map_err(|source| ScanError::CameraUnavailable { source })?;

        let mut light_on = false;
        if torch_on {
            if capabilities.has_torch {
                match source.set_torch(true) {
                    Ok(()) => light_on = true,
                    Err(e) => log::warn!("torch unavailable: {:#}", e),
                }
            } else {
                log::warn!("torch requested but {} has no flash unit", source.name());
            }
        }

        let mut core = self.shared.lock_core();
        if core.state == SessionState::Destroyed {
            source.halt();
            return Err(ScanError::SessionDestroyed);
        }
        let previous = core.state;
        core.state = SessionState::Running;
        core.capabilities = Some(capabilities);
        core.light_on = light_on;
        log::info!(
            "scan session running ({:?} -> Running, mode={:?}, facing={:?}, source={})",
            previous,
            core.mode,
            facing,
            source.name()
        );
        Ok(())
    }

    /// Halt frame delivery. The recognizer stays installed so a later `start` is cheap.
    /// No-op unless running.
    pub fn stop(&self) {
        let mut camera = self.shared.lock_camera();
        {
            let mut core = self.shared.lock_core();
            if core.state != SessionState::Running {
                return;
            }
            core.state = SessionState::Stopped;
            core.light_on = false;
        }
        if let Some(source) = camera.as_mut() {
            source.halt();
        }
        log::info!("scan session stopped");
    }

    /// Release the camera and recognizers. No callbacks fire afterwards. Idempotent.
    pub fn destroy(&self) {
        {
            let mut core = self.shared.quiesce(self.shared.lock_core());
            if core.state == SessionState::Destroyed {
                return;
            }
            core.state = SessionState::Destroyed;
            core.bump_generation();
            core.active = None;
            core.registry = None;
            core.listener = None;
            core.light_on = false;
        }
        self.shared.signal.notify_all();
        self.shared.dispatcher.shut_down();

        let source = self.shared.lock_camera().take();
        if let Some(mut source) = source {
            source.release();
        }
        log::info!("scan session destroyed");
    }

    /// Host came to the foreground.
    pub fn on_foreground(&self) -> Result<(), ScanError> {
        self.start()
    }

    /// Host went to the background.
    pub fn on_background(&self) {
        self.stop()
    }

    /// Host is tearing down.
    pub fn on_teardown(&self) {
        self.destroy()
    }

    // ------------------------------------------------------------------
    // Frames
    // ------------------------------------------------------------------

    /// Offer one camera frame. Called by the frame source for every captured frame.
    pub fn submit_frame(&self, frame: Frame) -> FrameDisposition {
        self.shared.submit(frame)
    }

    /// Push handle to give a frame source.
    pub fn sink(&self) -> FrameSink {
        self.shared.sink()
    }

    /// Single-shot recognition of a still image, bypassing the camera.
    ///
    /// A blank path or URI reports `on_fail(EmptyInput)` to the listener and returns
    /// `Ok`. Unreadable images fail here with `InvalidInput`. Otherwise the call waits for
    /// any outstanding recognition to be delivered (still images are never dropped),
    /// dispatches the image, and returns; the result arrives through the listener.
    /// Called from inside a listener callback it does not wait for that callback's own
    /// call.
    pub fn scan_image(&self, input: ImageInput) -> Result<(), ScanError> {
        let listener = {
            let core = self.shared.lock_core();
            core.ensure_alive()?;
            core.listener.clone()
        };
        if input.is_blank() {
            log::warn!("still-image scan requested without an image");
            if let Some(listener) = listener {
                listener.on_fail(FailureCode::EmptyInput, &anyhow!("photo path is empty"));
            }
            return Ok(());
        }

        let frame = load_still_image(input, self.shared.still_max_dimension)?;

        let me = std::thread::current().id();
        let mut core = self.shared.lock_core();
        loop {
            core.ensure_alive()?;
            if !core.is_busy_for(me) {
                break;
            }
            core = self.shared.wait(core);
        }
        let recognizer = core.active_recognizer()?;
        let ticket = core.claim();
        let options = core.options.clone();
        core.stats.still_images += 1;
        drop(core);

        let job = Job {
            ticket,
            recognizer,
            options,
            frame,
        };
        if let Err(e) = self.shared.dispatcher.send(&self.shared, job) {
            self.shared.lock_core().abandon(ticket);
            self.shared.signal.notify_all();
            return Err(ScanError::Dispatch(e));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Mode and configuration
    // ------------------------------------------------------------------

    /// Switch the recognizer variant. Any outstanding call for the old mode is discarded.
    pub fn set_mode(&self, mode: RecognitionMode) -> Result<(), ScanError> {
        let mut core = self.shared.quiesce(self.shared.lock_core());
        core.ensure_alive()?;
        if core.mode == mode {
            return Ok(());
        }
        let recognizer = core.lookup(mode)?;
        let previous = core.mode;
        core.bump_generation();
        core.mode = mode;
        core.install(recognizer.clone());
        let generation = core.generation();
        drop(core);
        self.shared.signal.notify_all();
        warm_up(&recognizer);
        log::info!(
            "recognition mode {:?} -> {:?} (generation {})",
            previous,
            mode,
            generation
        );
        Ok(())
    }

    pub fn mode(&self) -> RecognitionMode {
        self.shared.lock_core().mode
    }

    /// Gate result delivery. Recognition keeps running while disabled.
    pub fn set_analyze_enabled(&self, enabled: bool) -> Result<(), ScanError> {
        let mut core = self.shared.quiesce(self.shared.lock_core());
        core.ensure_alive()?;
        core.config.analyze_enabled = enabled;
        log::debug!("analyze_enabled = {}", enabled);
        Ok(())
    }

    pub fn is_analyze_enabled(&self) -> bool {
        self.shared.lock_core().config.analyze_enabled
    }

    /// Stored only; frame handling does not depend on it.
    pub fn set_continuous_scan(&self, continuous: bool) -> Result<(), ScanError> {
        let mut core = self.shared.lock_core();
        core.ensure_alive()?;
        core.config.continuous_scan = continuous;
        Ok(())
    }

    pub fn set_play_feedback(&self, play_sound: bool, vibrate: bool) -> Result<(), ScanError> {
        let mut core = self.shared.lock_core();
        core.ensure_alive()?;
        core.config.play_feedback = play_sound;
        core.config.vibrate_on_success = vibrate;
        Ok(())
    }

    /// Register (or clear) the listener. Without one, deliveries are no-ops.
    pub fn set_listener(
        &self,
        listener: Option<Arc<dyn SessionListener>>,
    ) -> Result<(), ScanError> {
        let mut core = self.shared.lock_core();
        core.ensure_alive()?;
        core.listener = listener;
        Ok(())
    }

    /// Restrict barcode decoding. `None` accepts every format.
    pub fn set_barcode_formats(
        &self,
        formats: Option<Vec<BarcodeFormat>>,
    ) -> Result<(), ScanError> {
        let mut core = self.shared.lock_core();
        core.ensure_alive()?;
        Arc::make_mut(&mut core.options).barcode_formats = formats;
        Ok(())
    }

    pub fn set_text_script(&self, script: TextScript) -> Result<(), ScanError> {
        let mut core = self.shared.lock_core();
        core.ensure_alive()?;
        Arc::make_mut(&mut core.options).text_script = script;
        Ok(())
    }

    /// Stop recognizing camera frames until `start_processor`. Still images still run.
    pub fn stop_processor(&self) -> Result<(), ScanError> {
        let mut core = self.shared.lock_core();
        core.ensure_alive()?;
        core.processing_paused = true;
        Ok(())
    }

    pub fn start_processor(&self) -> Result<(), ScanError> {
        let mut core = self.shared.lock_core();
        core.ensure_alive()?;
        core.processing_paused = false;
        Ok(())
    }

    pub fn config(&self) -> SessionConfig {
        self.shared.lock_core().config.clone()
    }

    pub fn recognizer_options(&self) -> RecognizerOptions {
        self.shared.lock_core().options.as_ref().clone()
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock_core().state
    }

    pub fn stats(&self) -> SessionStats {
        self.shared.lock_core().stats
    }

    /// A recognition is outstanding or its result is still being delivered.
    pub fn is_busy(&self) -> bool {
        self.shared.lock_core().is_busy()
    }

    // ------------------------------------------------------------------
    // Camera controls
    // ------------------------------------------------------------------

    pub fn facing(&self) -> CameraFacing {
        self.shared.lock_core().config.camera_facing
    }

    /// Flip between front and back cameras. No-op on single-camera devices.
    pub fn switch_camera(&self) -> Result<(), ScanError> {
        let facing = {
            let core = self.shared.lock_core();
            core.ensure_alive()?;
            core.config.camera_facing.flipped()
        };
        self.set_facing(facing)
    }

    /// Select a camera. While running, delivery is restarted on the new camera.
    pub fn set_facing(&self, facing: CameraFacing) -> Result<(), ScanError> {
        let mut camera = self.shared.lock_camera();
        let source = camera.as_mut().ok_or(ScanError::SessionDestroyed)?;
        if source.camera_count() < 2 {
            log::debug!("{} exposes a single camera; facing unchanged", source.name());
            return Ok(());
        }

        let was_running = {
            let mut core = self.shared.lock_core();
            core.ensure_alive()?;
            if core.config.camera_facing == facing {
                return Ok(());
            }
            core.config.camera_facing = facing;
            let running = core.state == SessionState::Running;
            if running {
                core.state = SessionState::Stopped;
            }
            running
        };

        if !was_running {
            if let Err(e) = source.set_facing(facing) {
                log::warn!("{} rejected facing {:?}: {:#}", source.name(), facing, e);
            }
            return Ok(());
        }

        source.halt();
        source
            .set_facing(facing)
            .map_err(|source| ScanError::CameraUnavailable { source })?;
        let capabilities = source
            .acquire(facing, self.shared.sink())
            .map_err(|source| ScanError::CameraUnavailable { source })?;

        let mut core = self.shared.lock_core();
        if core.state == SessionState::Destroyed {
            source.halt();
            return Err(ScanError::SessionDestroyed);
        }
        core.state = SessionState::Running;
        core.capabilities = Some(capabilities);
        if !capabilities.has_torch {
            core.light_on = false;
        }
        log::info!("camera switched to {:?}", facing);
        Ok(())
    }

    /// Flash capability reported by the camera at the last acquisition.
    pub fn has_torch(&self) -> bool {
        self.shared
            .lock_core()
            .capabilities
            .map(|caps| caps.has_torch)
            .unwrap_or(false)
    }

    pub fn is_light_on(&self) -> bool {
        self.shared.lock_core().light_on
    }

    /// Switch the flash unit. Hardware refusal is logged, not returned.
    ///
    /// While the camera is not running the request is only recorded and `start` applies
    /// it.
    pub fn set_torch(&self, on: bool) -> Result<(), ScanError> {
        let mut camera = self.shared.lock_camera();
        let source = camera.as_mut().ok_or(ScanError::SessionDestroyed)?;
        {
            let mut core = self.shared.lock_core();
            core.ensure_alive()?;
            if core.state != SessionState::Running {
                core.config.torch_on = on;
                log::debug!("torch {} recorded for next start", on);
                return Ok(());
            }
        }

        match source.set_torch(on) {
            Ok(()) => {
                let mut core = self.shared.lock_core();
                core.config.torch_on = on;
                core.light_on = on;
            }
            Err(e) => log::warn!("torch {} failed on {}: {:#}", on, source.name(), e),
        }
        Ok(())
    }

    /// Toggle the flash. No-op when the camera has no flash unit.
    pub fn switch_light(&self) -> Result<(), ScanError> {
        if !self.has_torch() {
            log::debug!("switch_light ignored: no flash unit");
            return Ok(());
        }
        let on = {
            let core = self.shared.lock_core();
            if core.state == SessionState::Running {
                !core.light_on
            } else {
                !core.config.torch_on
            }
        };
        self.set_torch(on)
    }
}

// ----------------------------------------------------------------------------
// Shared: frame path and completion handling
// ----------------------------------------------------------------------------

impl Shared {
    fn lock_core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_camera(&self) -> MutexGuard<'_, Option<Box<dyn FrameSource>>> {
        self.camera
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, Core>) -> MutexGuard<'a, Core> {
        self.signal
            .wait(guard)
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Wait until no other thread is inside a listener callback.
    fn quiesce<'a>(&self, mut core: MutexGuard<'a, Core>) -> MutexGuard<'a, Core> {
        let me = std::thread::current().id();
        while core.delivering.is_some_and(|delivery| delivery.thread != me) {
            core = self.wait(core);
        }
        core
    }

    fn sink(self: &Arc<Self>) -> FrameSink {
        let weak = Arc::downgrade(self);
        FrameSink::new(move |frame| match weak.upgrade() {
            Some(shared) => shared.submit(frame),
            None => FrameDisposition::DroppedInactive,
        })
    }

    fn submit(self: &Arc<Self>, frame: Frame) -> FrameDisposition {
        let mut core = self.lock_core();
        core.stats.frames_submitted += 1;
        if core.state != SessionState::Running {
            core.stats.frames_dropped_inactive += 1;
            return FrameDisposition::DroppedInactive;
        }
        if core.processing_paused {
            core.stats.frames_dropped_paused += 1;
            return FrameDisposition::DroppedPaused;
        }
        if core.is_busy() {
            core.stats.frames_dropped_busy += 1;
            log::trace!("frame dropped: recognition in flight");
            return FrameDisposition::DroppedBusy;
        }
        let recognizer = match core.active_recognizer() {
            Ok(recognizer) => recognizer,
            Err(e) => {
                log::error!("no active recognizer: {}", e);
                core.stats.frames_dropped_inactive += 1;
                return FrameDisposition::DroppedInactive;
            }
        };
        let ticket = core.claim();
        let options = core.options.clone();
        core.stats.frames_dispatched += 1;
        drop(core);

        let job = Job {
            ticket,
            recognizer,
            options,
            frame,
        };
        match self.dispatcher.send(self, job) {
            Ok(()) => FrameDisposition::Dispatched,
            Err(e) => {
                log::error!("failed to start recognition worker: {}", e);
                self.lock_core().abandon(ticket);
                self.signal.notify_all();
                FrameDisposition::DroppedInactive
            }
        }
    }

    /// Completion entry point, called from the worker thread.
    ///
    /// A current call keeps the outstanding-call slot through delivery; the slot is
    /// freed once the listener has returned.
    fn complete(
        self: &Arc<Self>,
        ticket: Ticket,
        outcome: anyhow::Result<RecognitionResult>,
        overlay: OverlayMetadata,
    ) {
        let mut core = self.lock_core();
        if !core.accept(ticket) {
            let generation = core.generation();
            drop(core);
            self.signal.notify_all();
            log::debug!(
                "dropping stale completion (generation {} < {})",
                ticket.generation,
                generation
            );
            return;
        }

        let plan = core.plan_delivery(&outcome);
        if plan == DeliveryPlan::Suppressed {
            core.abandon(ticket);
            drop(core);
            self.signal.notify_all();
            log::trace!("result suppressed: analysis disabled");
            return;
        }
        let listener = core.listener.clone();
        core.delivering = Some(Delivery {
            thread: std::thread::current().id(),
            ticket,
        });
        drop(core);

        let _delivery = DeliveryGuard {
            shared: self,
            ticket,
        };
        match (plan, outcome) {
            (DeliveryPlan::Success { feedback }, Ok(result)) => {
                if let Some((play_sound, vibrate)) = feedback {
                    self.feedback.trigger(play_sound, vibrate);
                }
                log::debug!("recognized [{:?}] {}", result.mode(), result.summary());
                if let Some(listener) = listener {
                    listener.on_success(result, overlay);
                }
            }
            (_, Err(e)) => {
                log::warn!("recognition failed: {:#}", e);
                if let Some(listener) = listener {
                    listener.on_fail(FailureCode::RecognitionFailure, &e);
                }
            }
            (plan, Ok(_)) => log::error!("inconsistent delivery plan {:?}", plan),
        }
    }
}

/// Warm up a newly installed engine. Skipped when the engine is mid-call.
fn warm_up(recognizer: &SharedRecognizer) {
    if let Ok(mut engine) = recognizer.try_lock() {
        if let Err(e) = engine.warm_up() {
            log::warn!("recognizer {} warm-up failed: {:#}", engine.name(), e);
        }
    }
}

/// Ends a delivery and frees its slot, even if the callback panics.
struct DeliveryGuard<'a> {
    shared: &'a Shared,
    ticket: Ticket,
}

impl Drop for DeliveryGuard<'_> {
    fn drop(&mut self) {
        let mut core = self.shared.lock_core();
        core.delivering = None;
        core.abandon(self.ticket);
        drop(core);
        self.shared.signal.notify_all();
    }
}
