//! The session controller: runs one mock interview at a time through
//! generate, speak, listen and commit, and publishes its state for a UI.

mod state;
mod task;

use std::num::NonZeroUsize;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

pub use state::{Phase, SessionOutcome, SessionSettings, SessionState};

use crate::error::SessionError;
use crate::question_source::QuestionSource;
use crate::speech::{SpeechInput, SpeechOutput};
use task::{SessionTask, Signal};

/// The capabilities a session is driven by.
#[derive(Clone)]
pub struct Collaborators {
    pub questions: Arc<dyn QuestionSource>,
    pub speech_output: Arc<dyn SpeechOutput>,
    pub speech_input: Arc<dyn SpeechInput>,
}

impl Collaborators {
    pub fn new(
        questions: Arc<dyn QuestionSource>,
        speech_output: Arc<dyn SpeechOutput>,
        speech_input: Arc<dyn SpeechInput>,
    ) -> Self {
        Self {
            questions,
            speech_output,
            speech_input,
        }
    }
}

/// Resolves once with how the session it was returned for ended.
#[derive(Debug)]
pub struct SessionCompletion {
    session_id: u64,
    rx: oneshot::Receiver<SessionOutcome>,
}

impl SessionCompletion {
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub async fn outcome(self) -> SessionOutcome {
        // A task torn down without reporting was aborted from outside.
        self.rx.await.unwrap_or(SessionOutcome::Aborted)
    }
}

struct ActiveSession {
    id: u64,
    signals: mpsc::UnboundedSender<Signal>,
    task: JoinHandle<()>,
}

pub struct SessionController {
    collaborators: Collaborators,
    settings: SessionSettings,
    state: Arc<watch::Sender<SessionState>>,
    next_session: u64,
    active: Option<ActiveSession>,
}

impl SessionController {
    pub fn new(collaborators: Collaborators, settings: SessionSettings) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            collaborators,
            settings,
            state: Arc::new(state),
            next_session: 0,
            active: None,
        }
    }

    /// Starts a session of `count` questions. Must be called inside a Tokio runtime.
    pub fn start_session(&mut self, count: usize) -> Result<SessionCompletion, SessionError> {
        let count = NonZeroUsize::new(count).ok_or(SessionError::InvalidQuestionCount)?;

        let current = self.state.borrow().phase;
        if current.is_running() {
            tracing::warn!("Refusing to start a session while {:?}", current);
            return Err(SessionError::AlreadyRunning);
        }

        // The previous task has published its terminal phase and is only
        // delivering its outcome; let it finish detached.
        self.active = None;

        self.next_session += 1;
        let id = self.next_session;
        self.state.send_replace(SessionState::starting(id, count.get()));

        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let session = SessionTask::new(
            id,
            self.collaborators.clone(),
            self.settings.clone(),
            self.state.clone(),
            signals_rx,
        );

        let task = tokio::spawn(async move {
            let outcome = session.run(count).await;
            if outcome_tx.send(outcome).is_err() {
                tracing::debug!("Session {} finished with nobody waiting", id);
            }
        });

        self.active = Some(ActiveSession {
            id,
            signals: signals_tx,
            task,
        });

        Ok(SessionCompletion {
            session_id: id,
            rx: outcome_rx,
        })
    }

    /// Ends the current answer. Only accepted while listening.
    pub fn signal_done_answering(&self) -> Result<(), SessionError> {
        let (phase, question) = {
            let state = self.state.borrow();
            (state.phase, state.question_index)
        };
        if phase != Phase::Listening {
            tracing::debug!("Done-answering rejected while {:?}", phase);
            return Err(SessionError::NotListening { phase });
        }

        if let Some(active) = &self.active {
            if active.signals.send(Signal::DoneAnswering { question }).is_err() {
                tracing::debug!("Session {} already finished", active.id);
            }
        }
        Ok(())
    }

    /// Stops the running session, if any, and waits for it to wind down.
    /// Calling this with no session running does nothing.
    pub async fn exit_session(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        tracing::info!("Exiting session {}", active.id);
        // A closed channel means the task already ended on its own.
        let _ = active.signals.send(Signal::Exit);

        if let Err(e) = active.task.await {
            tracing::error!("Session {} task failed: {}", active.id, e);
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// A snapshot of the published state.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            let _ = active.signals.send(Signal::Exit);
        }
    }
}
