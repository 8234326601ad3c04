use anyhow::anyhow;
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, SendError, Sender};
use std::sync::{Arc, Mutex, Weak};
use std::time::Instant;

use super::state::Ticket;
use super::Shared;
use crate::frame::Frame;
use crate::recognize::{RecognitionResult, RecognizerOptions, SharedRecognizer};

/// One recognizer call handed to the worker.
pub(super) struct Job {
    pub ticket: Ticket,
    pub recognizer: SharedRecognizer,
    pub options: Arc<RecognizerOptions>,
    pub frame: Frame,
}

enum WorkerState {
    Idle,
    Running(Sender<Job>),
    Closed,
}

/// Feeds recognizer calls to a single long-lived worker thread.
///
/// The worker is started on first use and holds only a weak reference to the session,
/// so dropping every session handle ends it. Completions, and therefore listener
/// callbacks, all run on this one thread in dispatch order.
pub(super) struct Dispatcher {
    state: Mutex<WorkerState>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(WorkerState::Idle),
        }
    }

    pub fn send(&self, shared: &Arc<Shared>, job: Job) -> io::Result<()> {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let job = match &*state {
            WorkerState::Running(sender) => match sender.send(job) {
                Ok(()) => return Ok(()),
                Err(SendError(job)) => {
                    log::warn!("recognition worker exited; restarting it");
                    job
                }
            },
            WorkerState::Closed => {
                return Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "recognition worker shut down",
                ))
            }
            WorkerState::Idle => job,
        };

        let (sender, receiver) = mpsc::channel();
        let weak = Arc::downgrade(shared);
        std::thread::Builder::new()
            .name("scan-recognizer".to_string())
            .spawn(move || run(weak, receiver))?;
        sender
            .send(job)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "recognition worker exited"))?;
        *state = WorkerState::Running(sender);
        Ok(())
    }

    /// Close the queue. Jobs already queued still run and complete as stale; a call
    /// stuck in the recognizer is not waited for.
    pub fn shut_down(&self) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *state = WorkerState::Closed;
    }
}

fn run(shared: Weak<Shared>, jobs: Receiver<Job>) {
    for job in jobs {
        let Job {
            ticket,
            recognizer,
            options,
            frame,
        } = job;
        let overlay = frame.metadata();
        let outcome = recognize(&recognizer, &options, frame);
        drop(recognizer);

        let Some(session) = shared.upgrade() else {
            break;
        };
        if catch_unwind(AssertUnwindSafe(|| session.complete(ticket, outcome, overlay))).is_err() {
            log::error!("listener panicked while handling call {}", ticket.seq);
        }
    }
    log::debug!("recognition worker stopped");
}

fn recognize(
    recognizer: &SharedRecognizer,
    options: &RecognizerOptions,
    frame: Frame,
) -> anyhow::Result<RecognitionResult> {
    let mut engine = recognizer
        .lock()
        .map_err(|_| anyhow!("recognizer lock poisoned"))?;
    let name = engine.name();
    let started = Instant::now();

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        engine.configure(options);
        engine.recognize(&frame)
    }))
    .unwrap_or_else(|_| Err(anyhow!("recognizer {} panicked", name)));

    log::trace!(
        "{} finished {:?} in {} ms (frame age {} ms)",
        name,
        frame.metadata().facing,
        started.elapsed().as_millis(),
        frame.age_ms()
    );
    outcome
}
