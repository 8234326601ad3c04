use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::ScanError;

use super::recognizer::{RecognitionMode, Recognizer};

/// Recognizer shared between a session and its worker threads.
pub type SharedRecognizer = Arc<Mutex<dyn Recognizer>>;

/// Recognizers available to a session, one per mode.
///
/// Engines are wrapped in `Mutex` because `Recognizer::recognize` takes `&mut self`.
pub struct RecognizerRegistry {
    recognizers: HashMap<RecognitionMode, SharedRecognizer>,
}

impl RecognizerRegistry {
    pub fn new() -> Self {
        Self {
            recognizers: HashMap::new(),
        }
    }

    /// Register an engine under the mode it reports. Replaces any earlier engine for
    /// that mode.
    pub fn register<R: Recognizer + 'static>(&mut self, recognizer: R) {
        let mode = recognizer.mode();
        if let Some(previous) = self
            .recognizers
            .insert(mode, Arc::new(Mutex::new(recognizer)))
        {
            let name = previous.lock().map(|r| r.name()).unwrap_or("<poisoned>");
            log::debug!("recognizer registry: replaced {} for {:?}", name, mode);
        }
    }

    /// Builder-style `register`.
    pub fn with<R: Recognizer + 'static>(mut self, recognizer: R) -> Self {
        self.register(recognizer);
        self
    }

    /// Engine registered for `mode`.
    pub fn get(&self, mode: RecognitionMode) -> Result<SharedRecognizer, ScanError> {
        self.recognizers
            .get(&mode)
            .cloned()
            .ok_or(ScanError::RecognizerMissing(mode))
    }

    pub fn supports(&self, mode: RecognitionMode) -> bool {
        self.recognizers.contains_key(&mode)
    }

    /// Registered modes.
    pub fn modes(&self) -> Vec<RecognitionMode> {
        self.recognizers.keys().copied().collect()
    }
}

impl Default for RecognizerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
