use std::time::Duration;

use crate::session::Phase;

/// Failure to produce the question batch. Fatal to starting a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("question request failed: {0}")]
    Request(String),
    #[error("question generation timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed question payload: {0}")]
    Malformed(String),
    #[error("expected {expected} questions, got {actual}")]
    WrongCount { expected: usize, actual: usize },
}

/// Failure to speak a question. The session degrades and keeps going.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SynthesisError {
    #[error("speech request failed: {0}")]
    Request(String),
    #[error("audio playback failed: {0}")]
    Playback(String),
    #[error("speaking timed out after {0:?}")]
    Timeout(Duration),
}

/// Speech recognition is not available on this host.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("speech recognition unavailable: {reason}")]
pub struct RecognitionUnavailable {
    pub reason: String,
}

impl RecognitionUnavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Failure to score a finished session. The session's pairs stay valid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvaluationError {
    #[error("feedback request failed: {0}")]
    Request(String),
    #[error("feedback timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed feedback payload: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("question count must be at least 1")]
    InvalidQuestionCount,
    #[error("a session is already running")]
    AlreadyRunning,
    #[error("done-answering is only accepted while listening (current phase: {phase:?})")]
    NotListening { phase: Phase },
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
    #[error(transparent)]
    Recognition(#[from] RecognitionUnavailable),
}
