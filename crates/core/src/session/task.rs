use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{Interval, MissedTickBehavior};

use super::Collaborators;
use super::state::{Phase, SessionOutcome, SessionSettings, SessionState};
use crate::error::{GenerationError, SessionError, SynthesisError};
use crate::model::{QaPair, QuestionItem};
use crate::speech::{FragmentSink, ListenHandle, ListenTag, RecognizerEvent, TaggedEvent};
use crate::transcript::TranscriptAccumulator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Signal {
    /// The user finished answering the question at this index.
    DoneAnswering { question: usize },
    Exit,
}

/// Result of a phase that can be interrupted by an exit.
enum Flow<T> {
    Continue(T),
    Exit,
}

/// The session's single thread of control. Owns the transcript and is the
/// only writer of the published state for its session id.
pub(crate) struct SessionTask {
    id: u64,
    collaborators: Collaborators,
    settings: SessionSettings,
    state: Arc<watch::Sender<SessionState>>,
    signals: mpsc::UnboundedReceiver<Signal>,
    fragments_tx: mpsc::UnboundedSender<TaggedEvent>,
    fragments_rx: mpsc::UnboundedReceiver<TaggedEvent>,
}

impl SessionTask {
    pub(crate) fn new(
        id: u64,
        collaborators: Collaborators,
        settings: SessionSettings,
        state: Arc<watch::Sender<SessionState>>,
        signals: mpsc::UnboundedReceiver<Signal>,
    ) -> Self {
        let (fragments_tx, fragments_rx) = mpsc::unbounded_channel();
        Self {
            id,
            collaborators,
            settings,
            state,
            signals,
            fragments_tx,
            fragments_rx,
        }
    }

    pub(crate) async fn run(mut self, count: NonZeroUsize) -> SessionOutcome {
        tracing::info!("Session {} started with {} questions", self.id, count);

        let questions = match self.generate(count).await {
            Flow::Exit => return self.abort(),
            Flow::Continue(Err(e)) => return self.fail(e),
            Flow::Continue(Ok(questions)) => questions,
        };

        let mut pairs = Vec::with_capacity(questions.len());
        for (index, item) in questions.iter().enumerate() {
            if let Flow::Exit = self.speak(index, item).await {
                return self.abort();
            }

            let answer = match self.listen(index, item).await {
                Flow::Continue(answer) => answer,
                Flow::Exit => return self.abort(),
            };

            // Processing: the only place a pair is created.
            let pair = QaPair::from_answer(item, &answer);
            tracing::info!("Answer {} committed: \"{}\"", index + 1, pair.answer);
            pairs.push(pair.clone());
            self.publish(|s| {
                s.phase = Phase::Processing;
                s.pairs.push(pair);
            });
        }

        tracing::info!("Session {} done with {} answers", self.id, pairs.len());
        self.publish(|s| s.phase = Phase::Done);
        SessionOutcome::Completed(pairs)
    }

    async fn generate(
        &mut self,
        count: NonZeroUsize,
    ) -> Flow<Result<Vec<QuestionItem>, GenerationError>> {
        let limit = self.settings.generate_timeout;
        let source = self.collaborators.questions.clone();
        let generate = tokio::time::timeout(limit, source.generate(count));
        tokio::pin!(generate);

        loop {
            tokio::select! {
                biased;
                signal = self.signals.recv() => match signal {
                    Some(Signal::DoneAnswering { .. }) => {
                        tracing::debug!("Ignoring done-answering while generating");
                    }
                    Some(Signal::Exit) | None => return Flow::Exit,
                },
                result = &mut generate => {
                    let result = match result {
                        Ok(Ok(questions)) if questions.len() != count.get() => {
                            Err(GenerationError::WrongCount {
                                expected: count.get(),
                                actual: questions.len(),
                            })
                        }
                        Ok(result) => result,
                        Err(_) => Err(GenerationError::Timeout(limit)),
                    };
                    return Flow::Continue(result);
                }
            }
        }
    }

    async fn speak(&mut self, index: usize, item: &QuestionItem) -> Flow<()> {
        self.publish(|s| {
            s.phase = Phase::Speaking;
            s.question_index = index;
            s.question_text = item.question.clone();
            s.revealed_question.clear();
            s.transcript.clear();
            s.last_error = None;
        });
        tracing::info!("Speaking question {}: {}", index + 1, item.question);

        let limit = self.settings.speak_timeout;
        let output = self.collaborators.speech_output.clone();
        let speak = tokio::time::timeout(limit, output.speak(&item.question));
        tokio::pin!(speak);

        let chars: Vec<char> = item.question.chars().collect();
        let mut revealed = 0;
        let mut ticker = reveal_ticker(self.settings.reveal_interval);

        loop {
            tokio::select! {
                biased;
                signal = self.signals.recv() => match signal {
                    Some(Signal::DoneAnswering { .. }) => {
                        tracing::debug!("Ignoring done-answering while question {} is spoken", index + 1);
                    }
                    Some(Signal::Exit) | None => {
                        tracing::info!("Exit while speaking question {}", index + 1);
                        output.cancel();
                        return Flow::Exit;
                    }
                },
                result = &mut speak => {
                    let failure = match result {
                        Ok(Ok(())) => None,
                        Ok(Err(e)) => Some(e),
                        Err(_) => {
                            output.cancel();
                            Some(SynthesisError::Timeout(limit))
                        }
                    };
                    if let Some(e) = failure {
                        tracing::warn!("Could not speak question {}: {}. Continuing to listen.", index + 1, e);
                        self.publish(|s| s.last_error = Some(SessionError::Synthesis(e)));
                    }
                    break;
                }
                _ = next_tick(&mut ticker), if revealed < chars.len() => {
                    revealed += 1;
                    let prefix: String = chars[..revealed].iter().collect();
                    self.publish(|s| s.revealed_question = prefix);
                }
            }
        }

        Flow::Continue(())
    }

    async fn listen(&mut self, index: usize, item: &QuestionItem) -> Flow<String> {
        self.publish(|s| {
            s.phase = Phase::Listening;
            s.revealed_question = item.question.clone();
            s.transcript.clear();
        });

        let tag = ListenTag {
            session: self.id,
            question: index,
        };
        let sink = FragmentSink::new(self.fragments_tx.clone(), tag);
        let mut handle: Option<ListenHandle> = match self.collaborators.speech_input.start(sink) {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!("{}. Question {} will have an empty transcript.", e, index + 1);
                self.publish(|s| s.last_error = Some(SessionError::Recognition(e)));
                None
            }
        };
        tracing::debug!("Listening for answer {}", index + 1);

        let mut transcript = TranscriptAccumulator::new();
        loop {
            tokio::select! {
                biased;
                signal = self.signals.recv() => match signal {
                    Some(Signal::DoneAnswering { question }) if question == index => break,
                    Some(Signal::DoneAnswering { question }) => {
                        tracing::debug!("Ignoring stale done-answering for question {}", question + 1);
                    }
                    Some(Signal::Exit) | None => {
                        tracing::info!("Exit while listening to answer {}", index + 1);
                        if let Some(handle) = handle.as_mut() {
                            handle.stop();
                        }
                        return Flow::Exit;
                    }
                },
                Some(event) = self.fragments_rx.recv() => self.accept(tag, event, &mut transcript),
            }
        }

        if let Some(handle) = handle.as_mut() {
            handle.stop();
        }
        // Keep whatever the recognizer delivered before it was stopped.
        while let Ok(event) = self.fragments_rx.try_recv() {
            self.accept(tag, event, &mut transcript);
        }

        Flow::Continue(transcript.answer().to_string())
    }

    fn accept(&self, tag: ListenTag, event: TaggedEvent, transcript: &mut TranscriptAccumulator) {
        if event.tag != tag {
            tracing::debug!(
                "Dropping late recognizer event for session {} question {}",
                event.tag.session,
                event.tag.question + 1
            );
            return;
        }
        match event.event {
            RecognizerEvent::Fragment(fragment) => {
                tracing::debug!("Fragment (final: {}): {}", fragment.is_final, fragment.text);
                transcript.push(&fragment);
                let live = transcript.live_text();
                self.publish(|s| s.transcript = live);
            }
            RecognizerEvent::Ended => {
                tracing::debug!("Recognizer ended for question {}", tag.question + 1);
            }
        }
    }

    fn fail(self, error: GenerationError) -> SessionOutcome {
        tracing::error!("Session {} could not start: {}", self.id, error);
        let error = SessionError::Generation(error);
        let published = error.clone();
        self.publish(|s| {
            s.phase = Phase::Failed;
            s.last_error = Some(published);
        });
        SessionOutcome::Failed(error)
    }

    fn abort(self) -> SessionOutcome {
        tracing::info!("Session {} aborted", self.id);
        self.publish(|s| s.phase = Phase::Aborted);
        SessionOutcome::Aborted
    }

    /// Applies `update` only while the published state still belongs to this session.
    fn publish(&self, update: impl FnOnce(&mut SessionState)) {
        let id = self.id;
        self.state.send_if_modified(|state| {
            if state.session_id != id {
                return false;
            }
            update(state);
            true
        });
    }
}

fn reveal_ticker(period: Duration) -> Option<Interval> {
    if period.is_zero() {
        return None;
    }
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(ticker)
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
