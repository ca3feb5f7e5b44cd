use std::time::Duration;

use crate::error::SessionError;
use crate::model::QaPair;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    /// No session has been started yet.
    #[default]
    Idle,
    Generating,
    Speaking,
    Listening,
    Processing,
    Done,
    /// Question generation failed; the session never started.
    Failed,
    /// The user exited before the session finished.
    Aborted,
}

impl Phase {
    pub fn is_running(self) -> bool {
        matches!(
            self,
            Phase::Generating | Phase::Speaking | Phase::Listening | Phase::Processing
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Done | Phase::Failed | Phase::Aborted)
    }
}

/// Everything a UI needs to render the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    /// Increments on every `start_session`; identifies which run this state belongs to.
    pub session_id: u64,
    pub phase: Phase,
    pub question_index: usize,
    pub question_count: usize,
    /// Full text of the current question.
    pub question_text: String,
    /// The part of the current question revealed so far.
    pub revealed_question: String,
    /// Finalized answer text plus the interim preview.
    pub transcript: String,
    pub pairs: Vec<QaPair>,
    /// The most recent error. Degraded errors land here without stopping the session.
    pub last_error: Option<SessionError>,
}

impl SessionState {
    pub(crate) fn starting(session_id: u64, question_count: usize) -> Self {
        Self {
            session_id,
            phase: Phase::Generating,
            question_count,
            ..Self::default()
        }
    }

    /// True while a collaborator call is still in progress, as opposed to having failed.
    pub fn is_working(&self) -> bool {
        matches!(self.phase, Phase::Generating | Phase::Speaking | Phase::Processing)
    }

    pub fn has_failed(&self) -> bool {
        self.phase == Phase::Failed
    }
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub generate_timeout: Duration,
    pub speak_timeout: Duration,
    /// Delay between revealed characters of a question. Zero reveals it at once.
    pub reveal_interval: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            generate_timeout: Duration::from_secs(30),
            speak_timeout: Duration::from_secs(60),
            reveal_interval: Duration::from_millis(28),
        }
    }
}

/// How a session ended, delivered once to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Completed(Vec<QaPair>),
    Failed(SessionError),
    Aborted,
}
