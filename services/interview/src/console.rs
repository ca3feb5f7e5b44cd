//! Terminal stand-ins for speech: questions are printed, answers are typed.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use interview_core::{
    FragmentSink, ListenHandle, RecognitionUnavailable, SpeechInput, SpeechOutput, SynthesisError,
};

/// Prints each question instead of speaking it.
#[derive(Debug, Default)]
pub struct ConsoleSpeechOutput;

#[async_trait]
impl SpeechOutput for ConsoleSpeechOutput {
    async fn speak(&self, text: &str) -> Result<(), SynthesisError> {
        println!("\nInterviewer: {text}\n");
        Ok(())
    }

    fn cancel(&self) {}
}

/// Treats typed lines as final recognizer fragments.
///
/// The session starts and stops recognition; whoever reads the terminal calls
/// [`ConsoleRecognizer::deliver`] for every line typed while it is running.
#[derive(Debug, Clone, Default)]
pub struct ConsoleRecognizer {
    current: Arc<Mutex<Option<FragmentSink>>>,
}

impl ConsoleRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `line` as a final fragment. Returns `false` when nothing is listening.
    pub fn deliver(&self, line: &str) -> bool {
        let current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        match current.as_ref() {
            Some(sink) => sink.fragment(line, true),
            None => false,
        }
    }

    pub fn is_listening(&self) -> bool {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(FragmentSink::is_open)
    }
}

impl SpeechInput for ConsoleRecognizer {
    fn start(&self, sink: FragmentSink) -> Result<ListenHandle, RecognitionUnavailable> {
        tracing::debug!("Console recognizer listening for {:?}", sink.tag());
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(sink.clone());

        let current = self.current.clone();
        let tag = sink.tag();
        Ok(ListenHandle::new(&sink, move || {
            let mut current = current.lock().unwrap_or_else(PoisonError::into_inner);
            if current.as_ref().is_some_and(|s| s.tag() == tag) {
                *current = None;
            }
        }))
    }
}

/// A recognizer for hosts without speech recognition.
#[derive(Debug, Clone)]
pub struct UnavailableRecognizer {
    reason: String,
}

impl UnavailableRecognizer {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl SpeechInput for UnavailableRecognizer {
    fn start(&self, _sink: FragmentSink) -> Result<ListenHandle, RecognitionUnavailable> {
        Err(RecognitionUnavailable::new(self.reason.clone()))
    }
}
